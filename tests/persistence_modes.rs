use chrono::NaiveDate;
use remedia::lifecycle::{Action, ExitLevelPolicy};
use remedia::persist::{PersistenceMode, Persistor};
use remedia::sync::{SyncMode, Tracker};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn tracker(mode: PersistenceMode) -> Tracker {
    let store = Persistor::new(mode).expect("store");
    Tracker::new(
        Box::new(store),
        SyncMode::OptimisticLocal,
        ExitLevelPolicy::Keep,
    )
    .expect("tracker")
}

#[test]
fn in_memory_mode_allows_basic_operations() {
    let tracker = tracker(PersistenceMode::InMemory);
    let student = tracker
        .create_student("Alice Silva".into(), "c1".into(), "Iniciante".into())
        .expect("student");
    assert!(!student.enrollment().is_enrolled());
    // No ledger head should exist (nothing appended yet)
    assert!(tracker.ledger_head().unwrap().is_none());
}

#[test]
fn discharge_extends_the_ledger_chain() {
    let tracker = tracker(PersistenceMode::InMemory);
    let student = tracker
        .create_student("Bernardo Costa".into(), "c1".into(), "Iniciante".into())
        .expect("student");
    tracker
        .transition(
            student.id(),
            Action::Enter {
                started_on: None,
                entry_level: None,
            },
            date("2024-03-01"),
        )
        .expect("enroll");
    assert!(tracker.ledger_head().unwrap().is_none());
    tracker
        .transition(
            student.id(),
            Action::Exit { exit_level: None },
            date("2024-03-05"),
        )
        .expect("discharge");
    assert!(
        tracker.ledger_head().unwrap().is_some(),
        "expected ledger head after the first appended record"
    );
}

#[test]
fn file_mode_restores_prior_state_on_startup() {
    let path = "test_remedia_restore.db".to_string();
    // Ensure clean start
    let _ = std::fs::remove_file(&path);

    let head = {
        let tracker = tracker(PersistenceMode::File(path.clone()));
        let student = tracker
            .create_student("Alice Silva".into(), "c1".into(), "Iniciante".into())
            .expect("student");
        tracker
            .transition(
                student.id(),
                Action::Enter {
                    started_on: Some(date("2024-03-01")),
                    entry_level: None,
                },
                date("2024-03-01"),
            )
            .expect("enroll");
        tracker
            .transition(
                student.id(),
                Action::Exit {
                    exit_level: Some("Fluente".into()),
                },
                date("2024-03-11"),
            )
            .expect("discharge");
        tracker.ledger_head().unwrap().expect("head after discharge")
    };

    let restored = tracker(PersistenceMode::File(path.clone()));
    let students = restored.students().unwrap();
    assert_eq!(students.len(), 1);
    let student = &students[0];
    assert_eq!(student.name(), "Alice Silva");
    assert!(!student.enrollment().is_enrolled());
    let records = restored.records_for(student.id()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_days(), 10);
    // the ledger chain head survives the restart
    assert_eq!(restored.ledger_head().unwrap(), Some(head));
    // restored identities are retained; a new student gets a fresh one
    let new_student = restored
        .create_student("Bernardo Costa".into(), "c1".into(), "Iniciante".into())
        .expect("student");
    assert_ne!(new_student.id(), student.id());

    // Clean up
    let _ = std::fs::remove_file(&path);
}

#[test]
fn removing_a_student_cascades_to_the_ledger() {
    let tracker = tracker(PersistenceMode::InMemory);
    let student = tracker
        .create_student("Alice Silva".into(), "c1".into(), "Iniciante".into())
        .expect("student");
    tracker
        .transition(
            student.id(),
            Action::Enter {
                started_on: None,
                entry_level: None,
            },
            date("2024-03-01"),
        )
        .expect("enroll");
    tracker
        .transition(
            student.id(),
            Action::Exit { exit_level: None },
            date("2024-03-02"),
        )
        .expect("discharge");
    assert_eq!(tracker.records_for(student.id()).unwrap().len(), 1);

    tracker.remove_student(student.id()).expect("remove");
    assert!(tracker.get(student.id()).unwrap().is_none());
    assert!(tracker.records_for(student.id()).unwrap().is_empty());
    // the store row and its history rows left as a unit; a reconcile
    // (full reload from the store) finds nothing to bring back
    tracker.reconcile().expect("reconcile");
    assert!(tracker.students().unwrap().is_empty());
    assert!(tracker.records_for(student.id()).unwrap().is_empty());
}
