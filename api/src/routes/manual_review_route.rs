//! Manual trigger: review a commit or merge request by identifier,
//! synchronously, and hand the review text back to the caller.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use review_engine::{Job, JobTrigger};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::outcome_response;

#[derive(Debug, Deserialize)]
pub struct ManualReviewRequest {
    pub project_key: String,
    pub repo_slug: String,
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub mr_id: Option<i64>,
}

#[instrument(name = "manual_review_route", skip_all)]
pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ManualReviewRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = body?;

    if req.project_key.trim().is_empty() || req.repo_slug.trim().is_empty() {
        return Err(AppError::BadRequest {
            kind: "missing_field",
            message: "project_key and repo_slug are required".into(),
        });
    }

    let commit_id = req.commit_id.as_deref().filter(|s| !s.trim().is_empty());
    let payload = serde_json::json!({
        "project_key": req.project_key,
        "repo_slug": req.repo_slug,
        "commit_id": commit_id,
        "mr_id": req.mr_id,
    });

    // Exactly one identifier selects the job shape.
    let received_at = Utc::now();
    let job = match (commit_id, req.mr_id) {
        (Some(commit), None) => Job::for_commit(
            JobTrigger::Manual,
            req.project_key.clone(),
            req.repo_slug.clone(),
            commit,
            received_at,
        ),
        (None, Some(mr_id)) => Job::for_merge_request(
            JobTrigger::Manual,
            req.project_key.clone(),
            req.repo_slug.clone(),
            mr_id,
            received_at,
        ),
        _ => {
            return Err(AppError::BadRequest {
                kind: "missing_field",
                message: "exactly one of commit_id or mr_id must be provided".into(),
            });
        }
    };
    let job = job.with_payload(payload);

    info!(
        project = %job.project_key,
        repo = %job.repo_slug,
        "manual review triggered"
    );

    let outcome = state.engine.execute(&job).await;
    outcome_response(outcome)
}
