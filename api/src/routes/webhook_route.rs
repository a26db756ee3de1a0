//! Webhook sink: verify, classify, enqueue, answer.
//!
//! The handler never runs a pipeline. Accepted deliveries turn into jobs on
//! the bounded queue and the response returns immediately; a full queue is
//! the overload signal (503, nothing enqueued).

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use review_store::{EventType, FailureStage, NewFailureLog};

use crate::core::app_state::AppState;
use crate::error_handler::AppError;
use crate::routes::signature;
use crate::routes::webhook_payload::{self, PayloadError, WebhookEvent};

#[instrument(name = "webhook_route", skip_all)]
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // --- Signature gate --------------------------------------------------
    // Scanners and misconfigured senders hit this constantly; a bare 401
    // with no failure log is deliberate.
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(signature::SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !signature::verify(secret, provided, &body) {
            debug!("webhook rejected: invalid or missing signature");
            return AppError::Unauthorized.into_response();
        }
    }

    // --- Classification --------------------------------------------------
    let jobs = match webhook_payload::classify(&body, Utc::now()) {
        Ok(WebhookEvent::Jobs(jobs)) => jobs,
        Ok(WebhookEvent::Ignored { event_key }) => {
            debug!(event_key = event_key.as_deref().unwrap_or(""), "webhook ignored");
            return (StatusCode::OK, Json(json!({"status": "ignored"}))).into_response();
        }
        Err(err) => {
            record_rejection(&state, &body, &err);
            return AppError::BadRequest {
                kind: err.kind(),
                message: err.message(),
            }
            .into_response();
        }
    };

    // --- Dispatch ---------------------------------------------------------
    // All-or-nothing admission: either every job of this delivery fits the
    // queue or the sender gets the overload signal.
    let count = jobs.len();
    match state.jobs.try_reserve_many(count) {
        Ok(permits) => {
            for (permit, job) in permits.zip(jobs) {
                permit.send(job);
            }
            info!(jobs = count, "webhook accepted");
            (StatusCode::ACCEPTED, Json(json!({"status": "accepted", "jobs": count})))
                .into_response()
        }
        Err(_) => {
            warn!(jobs = count, "job queue full; webhook rejected");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "queue_full"})))
                .into_response()
        }
    }
}

/// A delivery that claimed to be actionable but failed validation leaves an
/// ingress-validation failure log behind the 400.
fn record_rejection(state: &AppState, body: &[u8], err: &PayloadError) {
    let payload = serde_json::from_slice::<serde_json::Value>(body)
        .map(|v| webhook_payload::snapshot(&v))
        .ok();

    let log = NewFailureLog {
        event_type: EventType::Webhook,
        event_key: err.event_key().map(str::to_string),
        request_payload: payload,
        project_key: None,
        repo_slug: None,
        commit_id: None,
        mr_id: None,
        author_name: None,
        author_email: None,
        failure_stage: FailureStage::IngressValidation,
        error_type: err.kind().to_string(),
        error_message: err.message(),
        error_stacktrace: None,
        retry_count: 0,
    };

    if let Err(e) = state.store.insert_failure(&log) {
        warn!(error = %e, "failed to record webhook rejection");
    }
}
