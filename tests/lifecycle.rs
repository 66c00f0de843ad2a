use chrono::NaiveDate;
use remedia::lifecycle::{transition, Action, ExitLevelPolicy};
use remedia::roster::{Enrollment, Student};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn student(enrollment: Enrollment) -> Student {
    Student::new(
        1,
        "Alice Silva".to_string(),
        "c1".to_string(),
        "Em Desenvolvimento".to_string(),
        enrollment,
    )
}

#[test]
fn enter_defaults_to_today_and_current_level() {
    let s = student(Enrollment::NotEnrolled);
    let t = transition(
        &s,
        Action::Enter {
            started_on: None,
            entry_level: None,
        },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert!(t.changed);
    assert!(t.record.is_none());
    assert_eq!(t.enrollment.started_on(), Some(date("2024-03-01")));
    assert_eq!(
        t.enrollment.entry_level().map(String::as_str),
        Some("Em Desenvolvimento")
    );
}

#[test]
fn enter_accepts_operator_supplied_fields() {
    let s = student(Enrollment::NotEnrolled);
    let t = transition(
        &s,
        Action::Enter {
            started_on: Some(date("2024-02-15")),
            entry_level: Some("Iniciante".to_string()),
        },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert!(t.changed);
    assert_eq!(t.enrollment.started_on(), Some(date("2024-02-15")));
    assert_eq!(
        t.enrollment.entry_level().map(String::as_str),
        Some("Iniciante")
    );
}

#[test]
fn enter_while_enrolled_keeps_the_open_episode() {
    let s = student(Enrollment::Enrolled {
        started_on: date("2024-02-01"),
        entry_level: "Iniciante".to_string(),
    });
    let t = transition(
        &s,
        Action::Enter {
            started_on: Some(date("2024-03-01")),
            entry_level: Some("Fluente".to_string()),
        },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert!(!t.changed);
    // the stored start date and entry level must survive untouched
    assert_eq!(t.enrollment.started_on(), Some(date("2024-02-01")));
    assert_eq!(
        t.enrollment.entry_level().map(String::as_str),
        Some("Iniciante")
    );
}

#[test]
fn enter_is_idempotent() {
    let s = student(Enrollment::NotEnrolled);
    let action = || Action::Enter {
        started_on: None,
        entry_level: None,
    };
    let first = transition(&s, action(), date("2024-03-01"), ExitLevelPolicy::Keep);
    let entered = s.with(first.enrollment.clone(), first.reading_level.clone());
    let second = transition(&entered, action(), date("2024-03-05"), ExitLevelPolicy::Keep);
    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.enrollment, first.enrollment);
}

#[test]
fn exit_while_not_enrolled_is_a_noop() {
    let s = student(Enrollment::NotEnrolled);
    let t = transition(
        &s,
        Action::Exit { exit_level: None },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert!(!t.changed);
    assert!(t.record.is_none());
    assert_eq!(t.enrollment, Enrollment::NotEnrolled);
}

#[test]
fn exit_closes_the_episode_and_derives_the_duration() {
    let s = student(Enrollment::Enrolled {
        started_on: date("2024-03-01"),
        entry_level: "Iniciante".to_string(),
    });
    let t = transition(
        &s,
        Action::Exit {
            exit_level: Some("Fluente".to_string()),
        },
        date("2024-03-11"),
        ExitLevelPolicy::Keep,
    );
    assert!(t.changed);
    assert_eq!(t.enrollment, Enrollment::NotEnrolled);
    let record = t.record.expect("discharge must produce a record");
    assert_eq!(record.entry_date(), date("2024-03-01"));
    assert_eq!(record.entry_level(), "Iniciante");
    assert_eq!(record.exit_date(), date("2024-03-11"));
    assert_eq!(record.exit_level(), "Fluente");
    assert_eq!(record.duration_days(), 10);
}

#[test]
fn same_day_discharge_counts_zero_days() {
    let s = student(Enrollment::Enrolled {
        started_on: date("2024-03-01"),
        entry_level: "Iniciante".to_string(),
    });
    let t = transition(
        &s,
        Action::Exit { exit_level: None },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert_eq!(t.record.unwrap().duration_days(), 0);
}

#[test]
fn exit_level_policy_adopt_overwrites_the_reading_level() {
    let s = student(Enrollment::Enrolled {
        started_on: date("2024-03-01"),
        entry_level: "Iniciante".to_string(),
    });
    let kept = transition(
        &s,
        Action::Exit {
            exit_level: Some("Avançado".to_string()),
        },
        date("2024-03-11"),
        ExitLevelPolicy::Keep,
    );
    assert_eq!(kept.reading_level, "Em Desenvolvimento");
    let adopted = transition(
        &s,
        Action::Exit {
            exit_level: Some("Avançado".to_string()),
        },
        date("2024-03-11"),
        ExitLevelPolicy::Adopt,
    );
    assert_eq!(adopted.reading_level, "Avançado");
}

#[test]
fn enrollment_invariant_holds_after_every_transition() {
    // inRemedial == true iff start date and entry level are present;
    // the tagged variant makes the two sides inseparable.
    let s = student(Enrollment::NotEnrolled);
    let entered = transition(
        &s,
        Action::Enter {
            started_on: None,
            entry_level: None,
        },
        date("2024-03-01"),
        ExitLevelPolicy::Keep,
    );
    assert_eq!(
        entered.enrollment.is_enrolled(),
        entered.enrollment.started_on().is_some() && entered.enrollment.entry_level().is_some()
    );
    let exited = transition(
        &s.with(entered.enrollment, entered.reading_level),
        Action::Exit { exit_level: None },
        date("2024-03-02"),
        ExitLevelPolicy::Keep,
    );
    assert_eq!(
        exited.enrollment.is_enrolled(),
        exited.enrollment.started_on().is_some() && exited.enrollment.entry_level().is_some()
    );
}
