//! The lifecycle engine: pure decision logic for the two-state remedial
//! enrollment machine (`NotEnrolled` ⇄ `Enrolled`).
//!
//! Given a student, a requested action and the clock (injected as a plain
//! date so the engine stays deterministic), [`transition`] produces the next
//! enrollment state and, on discharge, the [`RemedialRecord`] to append to
//! the history ledger. It has no side effects; persistence is the
//! synchronizer's concern.

use chrono::NaiveDate;

use crate::roster::{Enrollment, Level, RemedialRecord, Student};

/// Whether a discharge overwrites the student's current reading level with
/// the exit level, or leaves it untouched and relies on the ledger alone.
/// Source deployments disagree on this, so it is an explicit policy.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ExitLevelPolicy {
    Keep,
    Adopt,
}

/// A requested transition. Operator-supplied fields are optional; defaults
/// are the clock and the student's current reading level.
#[derive(Clone, Debug)]
pub enum Action {
    Enter {
        started_on: Option<NaiveDate>,
        entry_level: Option<Level>,
    },
    Exit {
        exit_level: Option<Level>,
    },
}

/// The engine's output: the next enrollment state and reading level, plus
/// the ledger entry when a discharge closed an episode.
///
/// `changed` distinguishes a real transition from a guard no-op (entering
/// while enrolled, exiting while not), which is a reachable UI race rather
/// than a fault and therefore not an error.
#[derive(Clone, Debug)]
pub struct Transition {
    pub enrollment: Enrollment,
    pub reading_level: Level,
    pub changed: bool,
    pub record: Option<RemedialRecord>,
}

impl Transition {
    fn unchanged(student: &Student) -> Self {
        Self {
            enrollment: student.enrollment().clone(),
            reading_level: student.reading_level().clone(),
            changed: false,
            record: None,
        }
    }
}

/// Computes the next enrollment state for `student` under `action`.
///
/// * `Enter` on a not-enrolled student opens an episode; the start date
///   defaults to `today` and the entry level to the current reading level.
/// * `Enter` on an enrolled student is a no-op: the open episode's start
///   date and entry level must never be overwritten, since the duration
///   math at discharge depends on them.
/// * `Exit` on an enrolled student closes the episode: the record is built
///   from the stored entry data, `exit_date = today`, and the enrollment
///   fields are cleared. Under [`ExitLevelPolicy::Adopt`] the student's
///   reading level becomes the exit level.
/// * `Exit` on a not-enrolled student is a no-op and produces no record.
pub fn transition(
    student: &Student,
    action: Action,
    today: NaiveDate,
    policy: ExitLevelPolicy,
) -> Transition {
    match action {
        Action::Enter {
            started_on,
            entry_level,
        } => {
            if student.enrollment().is_enrolled() {
                return Transition::unchanged(student);
            }
            Transition {
                enrollment: Enrollment::Enrolled {
                    started_on: started_on.unwrap_or(today),
                    entry_level: entry_level.unwrap_or_else(|| student.reading_level().clone()),
                },
                reading_level: student.reading_level().clone(),
                changed: true,
                record: None,
            }
        }
        Action::Exit { exit_level } => {
            let (started_on, entry_level) = match student.enrollment() {
                Enrollment::Enrolled {
                    started_on,
                    entry_level,
                } => (*started_on, entry_level.clone()),
                Enrollment::NotEnrolled => return Transition::unchanged(student),
            };
            let exit_level = exit_level.unwrap_or_else(|| student.reading_level().clone());
            let record = RemedialRecord::new(started_on, entry_level, today, exit_level.clone());
            let reading_level = match policy {
                ExitLevelPolicy::Adopt => exit_level,
                ExitLevelPolicy::Keep => student.reading_level().clone(),
            };
            Transition {
                enrollment: Enrollment::NotEnrolled,
                reading_level,
                changed: true,
                record: Some(record),
            }
        }
    }
}
