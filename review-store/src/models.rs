//! Row types for the two persistent tables.
//!
//! `New*` structs are what callers hand to the store; the full structs carry
//! the store-assigned `id` and `created_at`. Enumerations are persisted as
//! their wire strings so rows stay readable with plain `sqlite3`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a review was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    /// Triggered by a webhook delivery.
    Auto,
    /// Triggered by an operator (manual endpoint or diff upload).
    Manual,
}

impl ReviewType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewType::Auto => "auto",
            ReviewType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(ReviewType::Auto),
            "manual" => Some(ReviewType::Manual),
            _ => None,
        }
    }
}

/// What kind of change the review covered.
///
/// The `pull_request` spelling is kept on the wire for compatibility with
/// the read API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Commit,
    PullRequest,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::Commit => "commit",
            TriggerType::PullRequest => "pull_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(TriggerType::Commit),
            "pull_request" => Some(TriggerType::PullRequest),
            _ => None,
        }
    }
}

/// The inbound surface a failed request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Webhook,
    Manual,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Webhook => "webhook",
            EventType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(EventType::Webhook),
            "manual" => Some(EventType::Manual),
            _ => None,
        }
    }
}

/// The pipeline stage (or ingress check) a run died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    IngressValidation,
    DiffFetch,
    LlmInvocation,
    LlmParse,
    Notification,
    Persistence,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::IngressValidation => "ingress_validation",
            FailureStage::DiffFetch => "diff_fetch",
            FailureStage::LlmInvocation => "llm_invocation",
            FailureStage::LlmParse => "llm_parse",
            FailureStage::Notification => "notification",
            FailureStage::Persistence => "persistence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingress_validation" => Some(FailureStage::IngressValidation),
            "diff_fetch" => Some(FailureStage::DiffFetch),
            "llm_invocation" => Some(FailureStage::LlmInvocation),
            "llm_parse" => Some(FailureStage::LlmParse),
            "notification" => Some(FailureStage::Notification),
            "persistence" => Some(FailureStage::Persistence),
            _ => None,
        }
    }
}

/// Addresses a review email was (or would have been) sent to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecipients {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
}

/// A review outcome ready for insertion. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct NewReviewRecord {
    pub review_type: ReviewType,
    pub trigger_type: TriggerType,
    pub project_key: String,
    pub repo_slug: String,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub diff_content: String,
    pub review_feedback: String,
    pub email_recipients: Option<EmailRecipients>,
    pub llm_provider: String,
    pub llm_model: String,
}

/// A persisted review outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub review_type: ReviewType,
    pub trigger_type: TriggerType,
    pub project_key: String,
    pub repo_slug: String,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub diff_content: String,
    pub review_feedback: String,
    pub email_recipients: Option<EmailRecipients>,
    pub email_sent: bool,
    pub llm_provider: String,
    pub llm_model: String,
}

/// A failed run (or rejected request) ready for insertion.
#[derive(Debug, Clone)]
pub struct NewFailureLog {
    pub event_type: EventType,
    pub event_key: Option<String>,
    pub request_payload: Option<serde_json::Value>,
    pub project_key: Option<String>,
    pub repo_slug: Option<String>,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub failure_stage: FailureStage,
    pub error_type: String,
    pub error_message: String,
    pub error_stacktrace: Option<String>,
    pub retry_count: i64,
}

/// A persisted failure row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureLog {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub event_type: EventType,
    pub event_key: Option<String>,
    pub request_payload: Option<serde_json::Value>,
    pub project_key: Option<String>,
    pub repo_slug: Option<String>,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub failure_stage: FailureStage,
    pub error_type: String,
    pub error_message: String,
    pub error_stacktrace: Option<String>,
    pub retry_count: i64,
    pub resolved: bool,
    pub resolution_notes: Option<String>,
}

/// One window of a paginated listing; `total` is the true row count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub rows: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn enum_wire_strings_round_trip() {
        for stage in [
            FailureStage::IngressValidation,
            FailureStage::DiffFetch,
            FailureStage::LlmInvocation,
            FailureStage::LlmParse,
            FailureStage::Notification,
            FailureStage::Persistence,
        ] {
            assert_eq!(FailureStage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(ReviewType::parse("auto"), Some(ReviewType::Auto));
        assert_eq!(TriggerType::parse("pull_request"), Some(TriggerType::PullRequest));
        assert_eq!(EventType::parse("webhook"), Some(EventType::Webhook));
        assert_eq!(FailureStage::parse("bogus"), None);
    }

    #[test]
    fn recipients_serialize_as_plain_lists() {
        let recipients = EmailRecipients {
            to: vec!["dev@example.com".into()],
            cc: vec![],
        };
        let json = serde_json::to_string(&recipients).unwrap();
        assert_eq!(json, r#"{"to":["dev@example.com"],"cc":[]}"#);
    }
}
