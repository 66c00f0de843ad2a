//! Remedia – the remedial-enrollment lifecycle tracker behind a classroom
//! dashboard.
//!
//! Remedia centers on the remedial *episode*: a student enters the remedial
//! support track, stays there for some days, and is discharged, at which
//! point the closed episode becomes an immutable [`roster::RemedialRecord`]
//! in that student's history ledger. Concretely:
//! * A [`roster::Student`] is a roster row with a current reading level.
//! * [`roster::Enrollment`] is a tagged variant (`NotEnrolled` or
//!   `Enrolled { started_on, entry_level }`), so the "enrollment fields are
//!   present iff enrolled" invariant holds by construction.
//! * The [`lifecycle`] engine is pure: given a student, an action and the
//!   clock it computes the next enrollment state and, on discharge, the
//!   ledger entry — no side effects, trivially unit-testable.
//! * The [`sync::Tracker`] applies engine output to the in-memory
//!   [`roster::Roster`] (the view the UI reads) and to the store of record,
//!   reporting each of the two remote writes separately since no
//!   transaction spans them.
//!
//! ## Modules
//! * [`roster`] – Students, enrollment state, remedial records and the
//!   in-memory keeper of both.
//! * [`lifecycle`] – The pure two-state transition engine.
//! * [`persist`] – SQLite store of record, restoration, and the
//!   tamper-evident blake3 chain over appended records.
//! * [`sync`] – The persistence synchronizer: apply, reconcile, sync modes,
//!   per-student serialization.
//! * [`server`] – The HTTP facade consumed by the dashboard.
//! * [`settings`] – Deployment configuration.
//!
//! ## Persistence
//! The [`persist::Persistor`] encapsulates SQLite schema creation and
//! durable storage for students and their closed episodes. The
//! [`sync::Tracker`] wires a store together with the in-memory roster and
//! restores prior state on startup; `reconcile` repeats that restoration on
//! demand, replacing the local view wholesale.
//!
//! ## Quick Start
//! ```
//! use remedia::persist::{PersistenceMode, Persistor};
//! use remedia::sync::{SyncMode, Tracker};
//! use remedia::lifecycle::{Action, ExitLevelPolicy};
//!
//! let store = Persistor::new(PersistenceMode::InMemory).unwrap();
//! let tracker = Tracker::new(
//!     Box::new(store),
//!     SyncMode::OptimisticLocal,
//!     ExitLevelPolicy::Keep,
//! )
//! .unwrap();
//! let student = tracker
//!     .create_student("Alice Silva".into(), "c1".into(), "Iniciante".into())
//!     .unwrap();
//! let entered: chrono::NaiveDate = "2024-03-01".parse().unwrap();
//! tracker
//!     .transition(
//!         student.id(),
//!         Action::Enter { started_on: None, entry_level: None },
//!         entered,
//!     )
//!     .unwrap();
//! let discharged: chrono::NaiveDate = "2024-03-11".parse().unwrap();
//! let applied = tracker
//!     .transition(
//!         student.id(),
//!         Action::Exit { exit_level: Some("Fluente".into()) },
//!         discharged,
//!     )
//!     .unwrap();
//! assert_eq!(applied.record.unwrap().duration_days(), 10);
//! ```

pub mod error;
pub mod lifecycle;
pub mod persist;
pub mod roster;
pub mod server;
pub mod settings;
pub mod sync;
