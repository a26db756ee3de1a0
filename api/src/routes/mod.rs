//! HTTP handlers and their pure helpers.

pub mod failures_routes;
pub mod health_route;
pub mod manual_review_route;
pub mod review_diff_route;
pub mod reviews_routes;
pub mod signature;
pub mod webhook_payload;
pub mod webhook_route;

use axum::{Json, response::IntoResponse, response::Response};
use serde_json::json;

use review_engine::RunOutcome;

use crate::error_handler::{AppError, AppResult};

/// Maps a synchronous pipeline run to its HTTP shape. Failures carry the
/// engine's classifier so the caller sees the same kind the failure log
/// recorded; an empty change set is a success, not an error.
pub(crate) fn outcome_response(outcome: RunOutcome) -> AppResult<Response> {
    match outcome {
        RunOutcome::Completed { record_id, review, email_sent } => Ok(Json(json!({
            "status": "completed",
            "record_id": record_id,
            "review": review,
            "email_sent": email_sent,
        }))
        .into_response()),
        RunOutcome::EmptyChangeSet => {
            Ok(Json(json!({"status": "no_diff"})).into_response())
        }
        RunOutcome::Failed { kind, message, .. } => Err(AppError::Pipeline { kind, message }),
        RunOutcome::Cancelled { .. } => Err(AppError::Pipeline {
            kind: "cancelled".into(),
            message: "the run was interrupted by shutdown".into(),
        }),
    }
}
