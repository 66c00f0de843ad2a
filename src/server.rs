//! HTTP facade consumed by the dashboard UI (the roster collaborator).
//! Thin by design: it translates requests into tracker calls on a blocking
//! thread and reports every persistence failure back synchronously, so a
//! student can never appear enrolled locally while the store of record
//! silently disagrees.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::error::TrackerError;
use crate::lifecycle::Action;
use crate::roster::{RemedialRecord, Student};
use crate::sync::Tracker;

#[derive(Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub class_id: String,
    pub reading_level: String,
}

#[derive(Deserialize)]
pub struct EnrollRequest {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_level: Option<String>,
}

#[derive(Deserialize)]
pub struct DischargeRequest {
    #[serde(default)]
    pub exit_level: Option<String>,
}

// The wire shape of a student row, optional fields flattened out of the
// enrollment variant the way the store of record carries them.
#[derive(Serialize)]
pub struct StudentView {
    pub id: u64,
    pub name: String,
    pub class_id: String,
    pub reading_level: String,
    pub in_remedial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedial_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedial_entry_level: Option<String>,
}

impl StudentView {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id(),
            name: student.name().to_string(),
            class_id: student.class_id().to_string(),
            reading_level: student.reading_level().clone(),
            in_remedial: student.enrollment().is_enrolled(),
            remedial_start_date: student.enrollment().started_on(),
            remedial_entry_level: student.enrollment().entry_level().cloned(),
        }
    }
}

#[derive(Serialize)]
pub struct RecordView {
    pub entry_date: NaiveDate,
    pub entry_level: String,
    pub exit_date: NaiveDate,
    pub exit_level: String,
    pub duration_days: i64,
}

impl RecordView {
    fn from(record: &RemedialRecord) -> Self {
        Self {
            entry_date: record.entry_date(),
            entry_level: record.entry_level().clone(),
            exit_date: record.exit_date(),
            exit_level: record.exit_level().clone(),
            duration_days: record.duration_days(),
        }
    }
}

#[derive(Serialize)]
pub struct ApplyResponse {
    pub status: String,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_write: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_write: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn apply_response(result: crate::error::Result<crate::sync::Applied>) -> (StatusCode, Json<ApplyResponse>) {
    match result {
        Ok(applied) => {
            let body = ApplyResponse {
                status: "ok".into(),
                changed: applied.changed,
                student: Some(StudentView::from(&applied.student)),
                record: applied.record.as_deref().map(RecordView::from),
                enrollment_write: applied.report.as_ref().map(|r| r.enrollment.to_string()),
                ledger_write: applied
                    .report
                    .as_ref()
                    .and_then(|r| r.ledger.as_ref())
                    .map(|l| l.to_string()),
                error: None,
            };
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            let (status, enrollment_write, ledger_write) = match &e {
                TrackerError::UnknownStudent(_) => (StatusCode::NOT_FOUND, None, None),
                // a partial or failed store write: the local view may already
                // show the change, so the operator must see this
                TrackerError::Write { report } => (
                    StatusCode::BAD_GATEWAY,
                    Some(report.enrollment.to_string()),
                    report.ledger.as_ref().map(|l| l.to_string()),
                ),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
            };
            let msg = format!("{e}");
            warn!(%msg, code = %status.as_u16(), "transition failed");
            let body = ApplyResponse {
                status: "error".into(),
                changed: false,
                student: None,
                record: None,
                enrollment_write,
                ledger_write,
                error: Some(msg),
            };
            (status, Json(body))
        }
    }
}

pub fn router(tracker: Arc<Tracker>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    let roster_tracker = Arc::clone(&tracker);
    let create_tracker = Arc::clone(&tracker);
    let remove_tracker = Arc::clone(&tracker);
    let enroll_tracker = Arc::clone(&tracker);
    let discharge_tracker = Arc::clone(&tracker);
    let history_tracker = Arc::clone(&tracker);
    let reconcile_tracker = tracker;

    Router::new()
        .route(
            "/v1/roster",
            get(move || {
                let tracker = Arc::clone(&roster_tracker);
                async move {
                    match tokio::task::spawn_blocking(move || tracker.students()).await {
                        Ok(Ok(students)) => {
                            let views: Vec<StudentView> =
                                students.iter().map(|s| StudentView::from(s)).collect();
                            Ok(Json(views))
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "roster read failed");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")))
                        }
                        Err(e) => {
                            warn!(error = %e, "join error");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, "join error".into()))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/students",
            post(move |Json(req): Json<CreateStudentRequest>| {
                let tracker = Arc::clone(&create_tracker);
                async move {
                    match tokio::task::spawn_blocking(move || {
                        tracker.create_student(req.name, req.class_id, req.reading_level)
                    })
                    .await
                    {
                        Ok(Ok(student)) => {
                            Ok((StatusCode::CREATED, Json(StudentView::from(&student))))
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "student creation failed");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")))
                        }
                        Err(e) => {
                            warn!(error = %e, "join error");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, "join error".into()))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/students/:id",
            delete(move |Path(id): Path<u64>| {
                let tracker = Arc::clone(&remove_tracker);
                async move {
                    match tokio::task::spawn_blocking(move || tracker.remove_student(id)).await {
                        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT),
                        Ok(Err(e)) => {
                            warn!(error = %e, "student removal failed");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")))
                        }
                        Err(e) => {
                            warn!(error = %e, "join error");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, "join error".into()))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/students/:id/enroll",
            post(move |Path(id): Path<u64>, Json(req): Json<EnrollRequest>| {
                let tracker = Arc::clone(&enroll_tracker);
                async move {
                    let today = chrono::Local::now().date_naive();
                    let result = tokio::task::spawn_blocking(move || {
                        tracker.transition(
                            id,
                            Action::Enter {
                                started_on: req.start_date,
                                entry_level: req.entry_level,
                            },
                            today,
                        )
                    })
                    .await;
                    match result {
                        Ok(outcome) => apply_response(outcome),
                        Err(e) => {
                            warn!(error = %e, "join error");
                            apply_response(Err(TrackerError::Lock("worker panicked".into())))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/students/:id/discharge",
            post(move |Path(id): Path<u64>, Json(req): Json<DischargeRequest>| {
                let tracker = Arc::clone(&discharge_tracker);
                async move {
                    let today = chrono::Local::now().date_naive();
                    let result = tokio::task::spawn_blocking(move || {
                        tracker.transition(
                            id,
                            Action::Exit {
                                exit_level: req.exit_level,
                            },
                            today,
                        )
                    })
                    .await;
                    match result {
                        Ok(outcome) => apply_response(outcome),
                        Err(e) => {
                            warn!(error = %e, "join error");
                            apply_response(Err(TrackerError::Lock("worker panicked".into())))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/students/:id/history",
            get(move |Path(id): Path<u64>| {
                let tracker = Arc::clone(&history_tracker);
                async move {
                    match tokio::task::spawn_blocking(move || tracker.records_for(id)).await {
                        Ok(Ok(records)) => {
                            let views: Vec<RecordView> =
                                records.iter().map(|r| RecordView::from(r)).collect();
                            Ok(Json(views))
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "history read failed");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")))
                        }
                        Err(e) => {
                            warn!(error = %e, "join error");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, "join error".into()))
                        }
                    }
                }
            }),
        )
        .route(
            "/v1/reconcile",
            post(move || {
                let tracker = Arc::clone(&reconcile_tracker);
                async move {
                    match tokio::task::spawn_blocking(move || tracker.reconcile()).await {
                        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT),
                        Ok(Err(e)) => {
                            warn!(error = %e, "reconcile failed");
                            Err((StatusCode::BAD_GATEWAY, format!("{e}")))
                        }
                        Err(e) => {
                            warn!(error = %e, "join error");
                            Err((StatusCode::INTERNAL_SERVER_ERROR, "join error".into()))
                        }
                    }
                }
            }),
        )
        .layer(cors)
}
