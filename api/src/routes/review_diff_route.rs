//! Ad-hoc review of an uploaded diff, synchronous.
//!
//! Multipart form: one `.diff`/`.patch` file plus `project_key` and
//! `repo_slug`, optionally `author_name`, `author_email`, `description`.
//! The file ceiling is enforced here so the boundary is exact: a file of
//! exactly the ceiling passes, one byte more is rejected and logged.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    response::Response,
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use review_engine::Job;
use review_store::{EventType, FailureStage, NewFailureLog};

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::outcome_response;

/// Uploaded diff ceiling.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Outer body cap for the multipart request. Kept well above the file
/// ceiling so oversized-but-plausible uploads reach the per-file check
/// below (which owns the exact boundary and the failure logging) instead
/// of being cut off at the transport.
pub const UPLOAD_BODY_LIMIT: usize = 4 * MAX_UPLOAD_BYTES;

#[derive(Debug, Default)]
struct UploadForm {
    project_key: Option<String>,
    repo_slug: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
    description: Option<String>,
    file_name: Option<String>,
    diff: Option<String>,
}

#[instrument(name = "review_diff_route", skip_all)]
pub async fn handle(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest {
        kind: "malformed",
        message: format!("unreadable multipart body: {e}"),
    })? {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);

        if let Some(file_name) = file_name {
            if !(file_name.ends_with(".diff") || file_name.ends_with(".patch")) {
                let err = AppError::WrongFileType(format!(
                    "{file_name}: only .diff and .patch files are accepted"
                ));
                record_rejection(&state, &form, Some(&file_name), "wrong_file_type", &err);
                return Err(err);
            }

            let bytes = field.bytes().await.map_err(|e| AppError::BadRequest {
                kind: "malformed",
                message: format!("unreadable file field: {e}"),
            })?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                let err = AppError::PayloadTooLarge(format!(
                    "{file_name} is {} bytes; the ceiling is {MAX_UPLOAD_BYTES}",
                    bytes.len()
                ));
                record_rejection(&state, &form, Some(&file_name), "payload_too_large", &err);
                return Err(err);
            }

            form.file_name = Some(file_name);
            form.diff = Some(String::from_utf8_lossy(&bytes).into_owned());
            continue;
        }

        let value = field.text().await.map_err(|e| AppError::BadRequest {
            kind: "malformed",
            message: format!("unreadable form field: {e}"),
        })?;
        match name.as_str() {
            "project_key" => form.project_key = Some(value),
            "repo_slug" => form.repo_slug = Some(value),
            "author_name" => form.author_name = Some(value),
            "author_email" => form.author_email = Some(value),
            "description" => form.description = Some(value),
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }

    let missing = |what: &str| AppError::BadRequest {
        kind: "missing_field",
        message: format!("{what} is required"),
    };

    let project_key = form.project_key.clone().filter(|s| !s.trim().is_empty());
    let repo_slug = form.repo_slug.clone().filter(|s| !s.trim().is_empty());
    let (Some(project_key), Some(repo_slug)) = (project_key, repo_slug) else {
        let err = missing("project_key and repo_slug");
        record_rejection(&state, &form, form.file_name.as_deref(), "missing_field", &err);
        return Err(err);
    };
    let Some(diff) = form.diff.clone() else {
        let err = missing("a .diff or .patch file");
        record_rejection(&state, &form, None, "missing_field", &err);
        return Err(err);
    };

    let payload = serde_json::json!({
        "project_key": project_key,
        "repo_slug": repo_slug,
        "file_name": form.file_name,
        "description": form.description,
        "diff_bytes": diff.len(),
    });

    let job = Job::for_uploaded_diff(project_key, repo_slug, diff, Utc::now())
        .with_author(form.author_name.clone(), form.author_email.clone())
        .with_payload(payload);

    info!(
        project = %job.project_key,
        repo = %job.repo_slug,
        file = form.file_name.as_deref().unwrap_or(""),
        "uploaded diff review triggered"
    );

    let outcome = state.engine.execute(&job).await;
    outcome_response(outcome)
}

/// Upload rejections claimed to be actionable work, so they land in the
/// failure log as ingress validation failures.
fn record_rejection(
    state: &AppState,
    form: &UploadForm,
    file_name: Option<&str>,
    kind: &str,
    err: &AppError,
) {
    let log = NewFailureLog {
        event_type: EventType::Manual,
        event_key: Some("diff_upload".to_string()),
        request_payload: Some(serde_json::json!({
            "project_key": form.project_key,
            "repo_slug": form.repo_slug,
            "file_name": file_name,
            "description": form.description,
        })),
        project_key: form.project_key.clone(),
        repo_slug: form.repo_slug.clone(),
        commit_id: None,
        mr_id: None,
        author_name: form.author_name.clone(),
        author_email: form.author_email.clone(),
        failure_stage: FailureStage::IngressValidation,
        error_type: kind.to_string(),
        error_message: err.to_string(),
        error_stacktrace: None,
        retry_count: 0,
    };

    if let Err(e) = state.store.insert_failure(&log) {
        warn!(error = %e, "failed to record upload rejection");
    }
}
