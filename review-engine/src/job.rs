//! The normalised unit of work the engine consumes.
//!
//! Ingress produces one `Job` per actionable event (one per commit for push
//! events) and the pipeline owns it exclusively until the run terminates.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// What kind of change the job points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Commit,
    MergeRequest,
}

/// How the job entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    Webhook,
    Manual,
    UploadedDiff,
}

impl JobTrigger {
    /// Manual and uploaded-diff jobs produce `manual` review records.
    pub fn is_manual(self) -> bool {
        matches!(self, JobTrigger::Manual | JobTrigger::UploadedDiff)
    }
}

/// One unit of review work.
///
/// Invariants (upheld by the constructors): `project_key` and `repo_slug`
/// are non-empty; exactly one of `commit_id` / `mr_id` is set, except for
/// uploaded diffs where `supplied_diff` is set and neither id is required.
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    pub trigger: JobTrigger,
    pub project_key: String,
    pub repo_slug: String,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub supplied_diff: Option<String>,
    /// Webhook event name, when the job came from a webhook.
    pub event_key: Option<String>,
    /// Snapshot of the inbound request, carried so failed runs can persist
    /// what triggered them.
    pub request_payload: Option<Value>,
    pub received_at: DateTime<Utc>,
}

impl Job {
    /// A job for a single commit.
    pub fn for_commit(
        trigger: JobTrigger,
        project_key: impl Into<String>,
        repo_slug: impl Into<String>,
        commit_id: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: JobKind::Commit,
            trigger,
            project_key: project_key.into(),
            repo_slug: repo_slug.into(),
            commit_id: Some(commit_id.into()),
            mr_id: None,
            author_name: None,
            author_email: None,
            supplied_diff: None,
            event_key: None,
            request_payload: None,
            received_at,
        }
    }

    /// A job for a merge request.
    pub fn for_merge_request(
        trigger: JobTrigger,
        project_key: impl Into<String>,
        repo_slug: impl Into<String>,
        mr_id: i64,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: JobKind::MergeRequest,
            trigger,
            project_key: project_key.into(),
            repo_slug: repo_slug.into(),
            commit_id: None,
            mr_id: Some(mr_id),
            author_name: None,
            author_email: None,
            supplied_diff: None,
            event_key: None,
            request_payload: None,
            received_at,
        }
    }

    /// A job carrying its own diff; no SCM round-trips happen for these.
    pub fn for_uploaded_diff(
        project_key: impl Into<String>,
        repo_slug: impl Into<String>,
        diff: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: JobKind::Commit,
            trigger: JobTrigger::UploadedDiff,
            project_key: project_key.into(),
            repo_slug: repo_slug.into(),
            commit_id: None,
            mr_id: None,
            author_name: None,
            author_email: None,
            supplied_diff: Some(diff.into()),
            event_key: None,
            request_payload: None,
            received_at,
        }
    }

    pub fn with_author(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.author_name = name;
        self.author_email = email;
        self
    }

    pub fn with_event_key(mut self, event_key: impl Into<String>) -> Self {
        self.event_key = Some(event_key.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.request_payload = Some(payload);
        self
    }
}
