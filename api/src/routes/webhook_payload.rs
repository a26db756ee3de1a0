//! Webhook payload classification: raw bytes in, normalised jobs out.
//!
//! Pure apart from the caller-supplied receipt instant, so identical bytes
//! always produce identical jobs. The two accepted families are
//! merge-request events (repository nested inside the pull-request object)
//! and reference-changed pushes (repository at the top level, one job per
//! changed branch head). Everything else is acknowledged and dropped.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use review_engine::{Job, JobTrigger};

/// Merge-request event names that trigger a review.
const MR_EVENT_KEYS: &[&str] = &["pr:opened", "pr:from_ref_updated"];

/// Push event name.
const PUSH_EVENT_KEY: &str = "repo:refs_changed";

/// Payload snapshots above this are replaced with a stub in failure logs.
const MAX_PAYLOAD_SNAPSHOT_BYTES: usize = 64 * 1024;

/// Result of classifying one delivery.
#[derive(Debug)]
pub enum WebhookEvent {
    /// Actionable: zero or more jobs (a push of only tag changes is valid
    /// and yields none).
    Jobs(Vec<Job>),
    /// Known-shape delivery the agent does not act on.
    Ignored { event_key: Option<String> },
}

/// Rejections; all map to 400 plus an ingress-validation failure log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Body is not JSON.
    Malformed(String),
    /// Merge-request event without the nested target repository.
    MissingRepository { event_key: String },
    /// Event is otherwise missing a required field.
    MissingField {
        event_key: String,
        field: &'static str,
    },
}

impl PayloadError {
    /// Classifier for failure logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadError::Malformed(_) => "malformed",
            PayloadError::MissingRepository { .. } | PayloadError::MissingField { .. } => {
                "missing_field"
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            PayloadError::Malformed(detail) => format!("body is not valid JSON: {detail}"),
            PayloadError::MissingRepository { event_key } => {
                format!("{event_key}: pullRequest.toRef.repository is missing")
            }
            PayloadError::MissingField { event_key, field } => {
                format!("{event_key}: required field {field} is missing")
            }
        }
    }

    pub fn event_key(&self) -> Option<&str> {
        match self {
            PayloadError::Malformed(_) => None,
            PayloadError::MissingRepository { event_key }
            | PayloadError::MissingField { event_key, .. } => Some(event_key),
        }
    }
}

/// Classifies one raw webhook body.
pub fn classify(body: &[u8], received_at: DateTime<Utc>) -> Result<WebhookEvent, PayloadError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    let Some(event_key) = payload.get("eventKey").and_then(Value::as_str) else {
        return Ok(WebhookEvent::Ignored { event_key: None });
    };

    if MR_EVENT_KEYS.contains(&event_key) {
        return merge_request_job(event_key, &payload, received_at).map(|j| WebhookEvent::Jobs(vec![j]));
    }
    if event_key == PUSH_EVENT_KEY {
        return push_jobs(event_key, &payload, received_at).map(WebhookEvent::Jobs);
    }

    debug!(event_key, "unhandled webhook event");
    Ok(WebhookEvent::Ignored {
        event_key: Some(event_key.to_string()),
    })
}

/// The MR target repository is nested inside the pull-request object, NOT
/// at the top level.
fn merge_request_job(
    event_key: &str,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> Result<Job, PayloadError> {
    let pull_request = payload
        .get("pullRequest")
        .ok_or_else(|| PayloadError::MissingField {
            event_key: event_key.to_string(),
            field: "pullRequest",
        })?;

    let repository = pull_request
        .pointer("/toRef/repository")
        .ok_or_else(|| PayloadError::MissingRepository {
            event_key: event_key.to_string(),
        })?;

    let (project_key, repo_slug) =
        repository_coordinates(repository).ok_or_else(|| PayloadError::MissingRepository {
            event_key: event_key.to_string(),
        })?;

    let mr_id = pull_request
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| PayloadError::MissingField {
            event_key: event_key.to_string(),
            field: "pullRequest.id",
        })?;

    let author_name = pull_request
        .pointer("/author/user/displayName")
        .and_then(Value::as_str)
        .map(str::to_string);
    let author_email = pull_request
        .pointer("/author/user/emailAddress")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(
        Job::for_merge_request(JobTrigger::Webhook, project_key, repo_slug, mr_id, received_at)
            .with_author(author_name, author_email)
            .with_event_key(event_key)
            .with_payload(snapshot(payload)),
    )
}

/// One job per changed branch head. Tag changes and ref deletions carry
/// nothing reviewable and are skipped.
fn push_jobs(
    event_key: &str,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> Result<Vec<Job>, PayloadError> {
    let repository = payload
        .get("repository")
        .ok_or_else(|| PayloadError::MissingRepository {
            event_key: event_key.to_string(),
        })?;

    let (project_key, repo_slug) =
        repository_coordinates(repository).ok_or_else(|| PayloadError::MissingRepository {
            event_key: event_key.to_string(),
        })?;

    let author_name = payload
        .pointer("/actor/displayName")
        .and_then(Value::as_str)
        .map(str::to_string);
    let author_email = payload
        .pointer("/actor/emailAddress")
        .and_then(Value::as_str)
        .map(str::to_string);

    let changes = payload
        .get("changes")
        .and_then(Value::as_array)
        .ok_or_else(|| PayloadError::MissingField {
            event_key: event_key.to_string(),
            field: "changes",
        })?;

    let mut jobs = Vec::new();
    for change in changes {
        if let Some(ref_type) = change.pointer("/ref/type").and_then(Value::as_str)
            && ref_type != "BRANCH"
        {
            debug!(ref_type, "skipping non-branch change");
            continue;
        }

        let Some(to_hash) = change.get("toHash").and_then(Value::as_str) else {
            continue;
        };
        if to_hash.is_empty() || to_hash.chars().all(|c| c == '0') {
            // Ref deletion; nothing to review.
            continue;
        }

        jobs.push(
            Job::for_commit(
                JobTrigger::Webhook,
                project_key.clone(),
                repo_slug.clone(),
                to_hash,
                received_at,
            )
            .with_author(author_name.clone(), author_email.clone())
            .with_event_key(event_key)
            .with_payload(snapshot(payload)),
        );
    }

    Ok(jobs)
}

fn repository_coordinates(repository: &Value) -> Option<(String, String)> {
    let project_key = repository
        .pointer("/project/key")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    let repo_slug = repository
        .get("slug")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    Some((project_key.to_string(), repo_slug.to_string()))
}

/// Snapshot of the inbound payload for failure logs, bounded so one huge
/// delivery cannot bloat the store.
pub fn snapshot(payload: &Value) -> Value {
    let serialized = payload.to_string();
    if serialized.len() <= MAX_PAYLOAD_SNAPSHOT_BYTES {
        payload.clone()
    } else {
        serde_json::json!({
            "truncated": true,
            "original_bytes": serialized.len(),
            "eventKey": payload.get("eventKey").cloned().unwrap_or(Value::Null),
        })
    }
}
