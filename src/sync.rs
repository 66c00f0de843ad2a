//! The persistence synchronizer: applies the lifecycle engine's output to
//! the local in-memory roster and to the remote store of record, and
//! reconciles the two.
//!
//! The two remote writes of a discharge (enrollment update, ledger append)
//! are not wrapped in a transaction. Both are attempted, each outcome is
//! reported, and a partially applied result is an observable error rather
//! than a silent divergence.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::lifecycle::{self, Action, ExitLevelPolicy, Transition};
use crate::persist::Store;
use crate::roster::{
    RemedialRecord, Roster, Student, StudentHasher, StudentId, StudentIdGenerator,
};

/// How the local view is brought in line with the store of record after a
/// mutation.
///
/// * `OptimisticLocal` updates the roster before the remote writes and does
///   not roll back when one of them later fails. An accepted weakness: the
///   failed apply is still reported to the caller.
/// * `RefetchOnMutate` discards the local guess after a discharge (the
///   two-table write) and reloads roster and ledger from the store, trading
///   latency for correctness.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SyncMode {
    OptimisticLocal,
    RefetchOnMutate,
}

/// Outcome of one remote write.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum WriteStatus {
    Applied,
    Failed(String),
}

impl WriteStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteStatus::Applied)
    }
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteStatus::Applied => write!(f, "applied"),
            WriteStatus::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Per-write outcomes of one apply. The ledger write only exists when the
/// transition produced a record.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct WriteReport {
    pub enrollment: WriteStatus,
    pub ledger: Option<WriteStatus>,
}

impl WriteReport {
    pub fn all_applied(&self) -> bool {
        self.enrollment.is_applied() && self.ledger.as_ref().is_none_or(WriteStatus::is_applied)
    }
    /// True when exactly one of the two writes of a discharge went through,
    /// leaving the store of record internally inconsistent.
    pub fn is_partial(&self) -> bool {
        match &self.ledger {
            Some(ledger) => self.enrollment.is_applied() != ledger.is_applied(),
            None => false,
        }
    }
}

impl fmt::Display for WriteReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.ledger {
            Some(ledger) => write!(f, "enrollment {}, ledger {}", self.enrollment, ledger),
            None => write!(f, "enrollment {}", self.enrollment),
        }
    }
}

/// A transition that has been applied (or guarded) by the tracker.
#[derive(Clone, Debug)]
pub struct Applied {
    pub student: Arc<Student>,
    pub changed: bool,
    pub record: Option<Arc<RemedialRecord>>,
    /// None for guard no-ops, which never reach the store.
    pub report: Option<WriteReport>,
}

// ------------- Tracker -------------
// This wires the local roster view together with the store of record.
// The roster is deliberately unreachable from outside: callers go through
// get/transition/apply/reconcile and never mutate the list directly.
pub struct Tracker {
    // owns the id generator and the local view
    student_id_generator: Arc<Mutex<StudentIdGenerator>>,
    roster: Arc<Mutex<Roster>>,
    // responsible for the persistence layer
    store: Arc<Mutex<Box<dyn Store>>>,
    // one guard per student, serializing apply calls for that student
    guards: Mutex<HashMap<StudentId, Arc<Mutex<()>>, StudentHasher>>,
    mode: SyncMode,
    policy: ExitLevelPolicy,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| TrackerError::Lock(e.to_string()))
}

impl Tracker {
    /// Wires a tracker to a store and restores the prior state from it.
    pub fn new(store: Box<dyn Store>, mode: SyncMode, policy: ExitLevelPolicy) -> Result<Tracker> {
        let tracker = Tracker {
            student_id_generator: Arc::new(Mutex::new(StudentIdGenerator::new())),
            roster: Arc::new(Mutex::new(Roster::new())),
            store: Arc::new(Mutex::new(store)),
            guards: Mutex::new(HashMap::default()),
            mode,
            policy,
        };
        tracker.reconcile()?;
        Ok(tracker)
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }
    pub fn policy(&self) -> ExitLevelPolicy {
        self.policy
    }

    fn guard_for(&self, id: StudentId) -> Result<Arc<Mutex<()>>> {
        let mut guards = locked(&self.guards)?;
        Ok(Arc::clone(guards.entry(id).or_default()))
    }

    // functions to access the local view
    pub fn get(&self, id: StudentId) -> Result<Option<Arc<Student>>> {
        Ok(locked(&self.roster)?.get(&id))
    }
    pub fn students(&self) -> Result<Vec<Arc<Student>>> {
        Ok(locked(&self.roster)?.students())
    }
    pub fn enrolled(&self) -> Result<Vec<Arc<Student>>> {
        Ok(locked(&self.roster)?.enrolled())
    }
    pub fn records_for(&self, id: StudentId) -> Result<Vec<Arc<RemedialRecord>>> {
        Ok(locked(&self.roster)?.records_for(&id))
    }
    pub fn ledger_head(&self) -> Result<Option<String>> {
        Ok(locked(&self.store)?.ledger_head())
    }

    /// Creates a student in the store and the local view. Roster glue for
    /// the collaborator; assessment and class CRUD live elsewhere.
    pub fn create_student(
        &self,
        name: String,
        class_id: String,
        reading_level: String,
    ) -> Result<Arc<Student>> {
        let id = locked(&self.student_id_generator)?.generate();
        let student = Student::new(
            id,
            name,
            class_id,
            reading_level,
            crate::roster::Enrollment::NotEnrolled,
        );
        if let Err(e) = locked(&self.store)?.persist_student(&student) {
            locked(&self.student_id_generator)?.release(id);
            return Err(e);
        }
        let (kept_student, _) = locked(&self.roster)?.keep(student);
        info!(student = id, "student created");
        Ok(kept_student)
    }

    /// Removes a student from the store and the local view. The history
    /// ledger goes with the student (cascading ownership).
    pub fn remove_student(&self, id: StudentId) -> Result<()> {
        let guard = self.guard_for(id)?;
        let _serialized = locked(&guard)?;
        locked(&self.store)?.remove_student(id)?;
        locked(&self.roster)?.remove(&id);
        locked(&self.student_id_generator)?.release(id);
        info!(student = id, "student removed");
        Ok(())
    }

    /// Runs the lifecycle engine for one student and applies the outcome.
    /// Serialized per student, so a double-click on discharge cannot close
    /// the same episode twice.
    pub fn transition(&self, id: StudentId, action: Action, today: NaiveDate) -> Result<Applied> {
        let guard = self.guard_for(id)?;
        let _serialized = locked(&guard)?;
        let student = locked(&self.roster)?
            .get(&id)
            .ok_or(TrackerError::UnknownStudent(id))?;
        let transition = lifecycle::transition(&student, action, today, self.policy);
        if !transition.changed {
            debug!(student = id, "guarded transition, nothing to apply");
            return Ok(Applied {
                student,
                changed: false,
                record: None,
                report: None,
            });
        }
        self.apply_locked(id, &student, transition)
    }

    /// Applies an already computed transition. Public entry point for
    /// callers that ran the engine themselves.
    pub fn apply(&self, id: StudentId, transition: Transition) -> Result<Applied> {
        let guard = self.guard_for(id)?;
        let _serialized = locked(&guard)?;
        let student = locked(&self.roster)?
            .get(&id)
            .ok_or(TrackerError::UnknownStudent(id))?;
        if !transition.changed {
            return Ok(Applied {
                student,
                changed: false,
                record: None,
                report: None,
            });
        }
        self.apply_locked(id, &student, transition)
    }

    // Caller holds the per-student guard.
    fn apply_locked(
        &self,
        id: StudentId,
        current: &Arc<Student>,
        transition: Transition,
    ) -> Result<Applied> {
        let updated = current.with(transition.enrollment, transition.reading_level);
        let discharged = transition.record.is_some();

        // local first in optimistic mode, so the UI reflects the change
        // without waiting on the store
        let mut kept_student = None;
        let mut kept_record = None;
        if self.mode == SyncMode::OptimisticLocal {
            let mut roster = locked(&self.roster)?;
            let (student, _) = roster.keep(updated.clone());
            kept_student = Some(student);
            if let Some(record) = &transition.record {
                kept_record = Some(roster.append(id, record.clone()));
            }
        }

        // two independent remote writes, no transaction across them
        let enrollment = {
            let mut store = locked(&self.store)?;
            match store.persist_enrollment(&updated) {
                Ok(()) => WriteStatus::Applied,
                Err(e) => WriteStatus::Failed(e.to_string()),
            }
        };
        let ledger = match &transition.record {
            Some(record) => {
                let mut store = locked(&self.store)?;
                Some(match store.persist_record(id, record) {
                    Ok(()) => WriteStatus::Applied,
                    Err(e) => WriteStatus::Failed(e.to_string()),
                })
            }
            None => None,
        };
        let report = WriteReport { enrollment, ledger };

        if !report.all_applied() {
            // the optimistic local view may already show the change; the
            // operator is told so they can retry or reconcile manually
            warn!(student = id, report = %report, partial = report.is_partial(), "store write failure");
            return Err(TrackerError::Write { report });
        }

        // with both writes confirmed, bring the local view in line
        match self.mode {
            SyncMode::OptimisticLocal => {}
            SyncMode::RefetchOnMutate if discharged => {
                // the discharge touched two tables: drop the local guess
                // and reload everything from the store
                self.reconcile()?;
                kept_student = locked(&self.roster)?.get(&id);
                kept_record = locked(&self.roster)?.records_for(&id).last().cloned();
            }
            SyncMode::RefetchOnMutate => {
                let mut roster = locked(&self.roster)?;
                let (student, _) = roster.keep(updated.clone());
                kept_student = Some(student);
            }
        }

        let student = match kept_student {
            Some(student) => student,
            None => Arc::new(updated),
        };
        if discharged {
            info!(student = id, "discharged from remedial track");
        } else {
            info!(student = id, enrollment = %student.enrollment(), "enrolled in remedial track");
        }
        Ok(Applied {
            student,
            changed: true,
            record: kept_record,
            report: Some(report),
        })
    }

    /// Refreshes the local view from the store of record, replacing the
    /// roster and ledger wholesale.
    pub fn reconcile(&self) -> Result<()> {
        let (students, records) = {
            let mut store = locked(&self.store)?;
            (store.restore_students()?, store.restore_records()?)
        };
        let mut restored = Roster::new();
        {
            let mut generator = locked(&self.student_id_generator)?;
            for student in students {
                generator.retain(student.id());
                restored.keep(student);
            }
        }
        for (id, record) in records {
            restored.append(id, record);
        }
        let mut roster = locked(&self.roster)?;
        *roster = restored;
        info!(students = roster.len(), "local view reconciled with store");
        Ok(())
    }
}
