//! Pipeline orchestration: resolve diff → resolve author → invoke LLM →
//! persist → notify, with per-stage failure policy.
//!
//! The engine is stateless beyond references to its collaborators and is
//! shared by all workers. `run` never propagates an error to the caller;
//! every outcome lands in the store (or, for soft notification failures, in
//! the record's `email_sent` flag).

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use llm_gateway::PromptTemplate;
use notifier::ReviewEmail;
use review_store::{
    EmailRecipients, EventType, FailureStage, NewFailureLog, NewReviewRecord, ReviewType, Store,
    TriggerType,
};

use crate::job::{Job, JobKind, JobTrigger};
use crate::traits::{CollabError, DiffSource, ReviewMailer, ReviewModel};

/// Terminal state of one pipeline run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// A review record was written; `email_sent` reflects the notification.
    Completed {
        record_id: i64,
        review: String,
        email_sent: bool,
    },
    /// The change set was empty or whitespace-only; nothing was recorded.
    EmptyChangeSet,
    /// The run died at `stage`; a failure log row was written.
    Failed {
        stage: FailureStage,
        kind: String,
        message: String,
    },
    /// Shutdown interrupted the run before `stage`; a failure log row with
    /// `error_type = cancelled` was written.
    Cancelled { stage: FailureStage },
}

/// Orchestrates the review pipeline. One instance serves all workers.
pub struct ReviewEngine {
    scm: Arc<dyn DiffSource>,
    llm: Arc<dyn ReviewModel>,
    mailer: Arc<dyn ReviewMailer>,
    store: Arc<Store>,
    template: PromptTemplate,
    cancel: CancellationToken,
}

impl ReviewEngine {
    pub fn new(
        scm: Arc<dyn DiffSource>,
        llm: Arc<dyn ReviewModel>,
        mailer: Arc<dyn ReviewMailer>,
        store: Arc<Store>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scm,
            llm,
            mailer,
            store,
            template: PromptTemplate::default(),
            cancel,
        }
    }

    /// Replaces the default review prompt.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Fire-and-forget entry point for queued (webhook) jobs.
    pub async fn run(&self, job: Job) {
        match self.execute(&job).await {
            RunOutcome::Completed { record_id, email_sent, .. } => {
                info!(record_id, email_sent, "review pipeline completed");
            }
            RunOutcome::EmptyChangeSet => {
                debug!("empty change set; nothing recorded");
            }
            RunOutcome::Failed { stage, kind, .. } => {
                warn!(stage = stage.as_str(), kind = %kind, "review pipeline failed");
            }
            RunOutcome::Cancelled { stage } => {
                warn!(stage = stage.as_str(), "review pipeline cancelled by shutdown");
            }
        }
    }

    /// Runs the pipeline and reports the terminal state. Synchronous
    /// endpoints use this to answer the caller in-band.
    #[instrument(
        skip_all,
        fields(
            project = %job.project_key,
            repo = %job.repo_slug,
            commit = job.commit_id.as_deref().unwrap_or(""),
            mr = job.mr_id.unwrap_or(-1),
        )
    )]
    pub async fn execute(&self, job: &Job) -> RunOutcome {
        // ---- stage 1: resolve diff -------------------------------------
        if let Some(outcome) = self.cancelled_before(job, FailureStage::DiffFetch) {
            return outcome;
        }

        let diff = match self.resolve_diff(job).await {
            Ok(diff) => diff,
            Err(e) => {
                self.record_failure(job, FailureStage::DiffFetch, &e.kind, &e.message);
                return RunOutcome::Failed {
                    stage: FailureStage::DiffFetch,
                    kind: e.kind,
                    message: e.message,
                };
            }
        };

        if diff.trim().is_empty() {
            // An empty change set is not a failure; leave no trace.
            return RunOutcome::EmptyChangeSet;
        }

        // ---- stage 2: resolve author (best-effort) ---------------------
        let (author_name, author_email) = self.resolve_author(job).await;

        // ---- stage 3: invoke LLM ---------------------------------------
        if let Some(outcome) = self.cancelled_before(job, FailureStage::LlmInvocation) {
            return outcome;
        }

        let review = match self.llm.review_diff(&diff, &self.template).await {
            Ok(review) => review,
            Err(e) => {
                // An undecodable provider response is a parse failure; every
                // other error belongs to the invocation itself.
                let stage = if e.kind == "malformed" {
                    FailureStage::LlmParse
                } else {
                    FailureStage::LlmInvocation
                };
                self.record_failure(job, stage, &e.kind, &e.message);
                return RunOutcome::Failed {
                    stage,
                    kind: e.kind,
                    message: e.message,
                };
            }
        };

        // ---- stage 4: persist ------------------------------------------
        if let Some(outcome) = self.cancelled_before(job, FailureStage::Persistence) {
            return outcome;
        }

        let record = build_record(job, &diff, &review, author_name, author_email, self.llm.as_ref());
        let record_id = match self.store.insert_review(&record) {
            Ok(id) => id,
            Err(e) => {
                let kind = e.kind().to_string();
                let message = e.to_string();
                self.record_failure(job, FailureStage::Persistence, &kind, &message);
                return RunOutcome::Failed {
                    stage: FailureStage::Persistence,
                    kind,
                    message,
                };
            }
        };

        // ---- stage 5: notify (soft) ------------------------------------
        if let Some(outcome) = self.cancelled_before(job, FailureStage::Notification) {
            return outcome;
        }

        let email_sent = self.notify(&record, record_id, &review).await;

        RunOutcome::Completed {
            record_id,
            review,
            email_sent,
        }
    }

    async fn resolve_diff(&self, job: &Job) -> Result<String, CollabError> {
        if let Some(diff) = &job.supplied_diff {
            return Ok(diff.clone());
        }
        match job.kind {
            JobKind::Commit => {
                let commit = job.commit_id.as_deref().ok_or_else(|| {
                    CollabError::new("missing_field", "commit job without commit_id")
                })?;
                self.scm.commit_diff(&job.project_key, &job.repo_slug, commit).await
            }
            JobKind::MergeRequest => {
                let mr = job.mr_id.ok_or_else(|| {
                    CollabError::new("missing_field", "merge-request job without mr_id")
                })?;
                self.scm.merge_request_diff(&job.project_key, &job.repo_slug, mr).await
            }
        }
    }

    /// Prefers author data carried by the job; falls back to the SCM.
    /// Failures degrade to an anonymous record, never to a dead pipeline.
    async fn resolve_author(&self, job: &Job) -> (Option<String>, Option<String>) {
        if job.author_email.is_some() {
            return (job.author_name.clone(), job.author_email.clone());
        }
        if job.trigger == JobTrigger::UploadedDiff {
            // Nothing to look up for an ad-hoc diff.
            return (job.author_name.clone(), None);
        }

        let looked_up = match job.kind {
            JobKind::Commit => match job.commit_id.as_deref() {
                Some(commit) => {
                    self.scm.commit_author(&job.project_key, &job.repo_slug, commit).await
                }
                None => return (job.author_name.clone(), None),
            },
            JobKind::MergeRequest => match job.mr_id {
                Some(mr) => {
                    self.scm.merge_request_author(&job.project_key, &job.repo_slug, mr).await
                }
                None => return (job.author_name.clone(), None),
            },
        };

        match looked_up {
            Ok(author) => (author.name.or_else(|| job.author_name.clone()), author.email),
            Err(e) => {
                warn!(kind = %e.kind, message = %e.message, "author lookup failed; proceeding without");
                (job.author_name.clone(), None)
            }
        }
    }

    async fn notify(&self, record: &NewReviewRecord, record_id: i64, review: &str) -> bool {
        let email = ReviewEmail {
            project_key: record.project_key.clone(),
            repo_slug: record.repo_slug.clone(),
            commit_id: record.commit_id.clone(),
            mr_id: record.mr_id,
            author_name: record.author_name.clone(),
            author_email: record.author_email.clone(),
            review_markdown: review.to_string(),
        };

        match self.mailer.notify(&email).await {
            Ok(outcome) if outcome.was_sent() => {
                if let Err(e) = self.store.mark_email_sent(record_id) {
                    // The mail went out; a stale flag is the lesser problem.
                    error!(record_id, error = %e, "failed to mark email_sent");
                    return false;
                }
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(kind = %e.kind, message = %e.message, "notification failed; record kept");
                false
            }
        }
    }

    /// Checks the shutdown token before a stage. A cancelled run leaves a
    /// failure log row naming the stage that never started.
    fn cancelled_before(&self, job: &Job, next_stage: FailureStage) -> Option<RunOutcome> {
        if !self.cancel.is_cancelled() {
            return None;
        }
        self.record_failure(job, next_stage, "cancelled", "shutdown before stage started");
        Some(RunOutcome::Cancelled { stage: next_stage })
    }

    fn record_failure(&self, job: &Job, stage: FailureStage, kind: &str, message: &str) {
        let log = NewFailureLog {
            event_type: if job.trigger == JobTrigger::Webhook {
                EventType::Webhook
            } else {
                EventType::Manual
            },
            event_key: job.event_key.clone(),
            request_payload: job.request_payload.clone(),
            project_key: Some(job.project_key.clone()),
            repo_slug: Some(job.repo_slug.clone()),
            commit_id: job.commit_id.clone(),
            mr_id: job.mr_id,
            author_name: job.author_name.clone(),
            author_email: job.author_email.clone(),
            failure_stage: stage,
            error_type: kind.to_string(),
            error_message: message.to_string(),
            error_stacktrace: None,
            retry_count: 0,
        };

        if let Err(e) = self.store.insert_failure(&log) {
            error!(stage = stage.as_str(), error = %e, "failed to write failure log");
        }
    }
}

/// Assembles the review record for stage 4. Uploaded diffs carry no SCM
/// identifier, so the record gets a content-derived one to keep the
/// "commit or merge request" invariant and a usable mail subject.
fn build_record(
    job: &Job,
    diff: &str,
    review: &str,
    author_name: Option<String>,
    author_email: Option<String>,
    llm: &dyn ReviewModel,
) -> NewReviewRecord {
    let commit_id = match (&job.commit_id, job.mr_id) {
        (None, None) => Some(synthetic_commit_id(diff)),
        _ => job.commit_id.clone(),
    };

    let trigger_type = if job.mr_id.is_some() {
        TriggerType::PullRequest
    } else {
        TriggerType::Commit
    };

    let review_type = if job.trigger.is_manual() {
        ReviewType::Manual
    } else {
        ReviewType::Auto
    };

    let email_recipients = author_email.as_ref().map(|email| EmailRecipients {
        to: vec![email.clone()],
        cc: vec![],
    });

    NewReviewRecord {
        review_type,
        trigger_type,
        project_key: job.project_key.clone(),
        repo_slug: job.repo_slug.clone(),
        commit_id,
        mr_id: job.mr_id,
        author_name,
        author_email,
        diff_content: diff.to_string(),
        review_feedback: review.to_string(),
        email_recipients,
        llm_provider: llm.provider_name().to_string(),
        llm_model: llm.model_name().to_string(),
    }
}

/// Content-derived identifier for ad-hoc diffs.
fn synthetic_commit_id(diff: &str) -> String {
    hex::encode(Sha256::digest(diff.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_commit_id_is_stable_hex() {
        let a = synthetic_commit_id("+one line\n");
        let b = synthetic_commit_id("+one line\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let c = synthetic_commit_id("+another line\n");
        assert_ne!(a, c);
    }
}
