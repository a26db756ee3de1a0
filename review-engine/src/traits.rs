//! Collaborator seams for the pipeline.
//!
//! The engine talks to its external collaborators through these traits so
//! the pipeline is testable with in-process stubs. The production
//! implementations are the concrete clients, adapted here; errors cross the
//! seam as `(kind, message)` pairs, which is all the failure policy needs.

use async_trait::async_trait;

use llm_gateway::{PromptTemplate, ReviewLlm};
use notifier::{DeliveryOutcome, Notifier, ReviewEmail};
use scm_client::{ScmAuthor, ScmClient};

/// An error as the pipeline sees it: a short classifier from the finite
/// error vocabulary plus a human-readable message.
#[derive(Debug, Clone)]
pub struct CollabError {
    pub kind: String,
    pub message: String,
}

impl CollabError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<scm_client::ScmError> for CollabError {
    fn from(e: scm_client::ScmError) -> Self {
        CollabError::new(e.kind(), e.to_string())
    }
}

impl From<llm_gateway::LlmError> for CollabError {
    fn from(e: llm_gateway::LlmError) -> Self {
        CollabError::new(e.kind(), e.to_string())
    }
}

impl From<notifier::NotifierError> for CollabError {
    fn from(e: notifier::NotifierError) -> Self {
        CollabError::new(e.kind(), e.to_string())
    }
}

/// Where diffs and author metadata come from.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn commit_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Result<String, CollabError>;

    async fn merge_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> Result<String, CollabError>;

    async fn commit_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Result<ScmAuthor, CollabError>;

    async fn merge_request_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> Result<ScmAuthor, CollabError>;
}

#[async_trait]
impl DiffSource for ScmClient {
    async fn commit_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Result<String, CollabError> {
        Ok(self.fetch_commit_diff(project_key, repo_slug, commit_id).await?)
    }

    async fn merge_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> Result<String, CollabError> {
        Ok(self.fetch_merge_request_diff(project_key, repo_slug, mr_id).await?)
    }

    async fn commit_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> Result<ScmAuthor, CollabError> {
        Ok(self.fetch_commit_author(project_key, repo_slug, commit_id).await?)
    }

    async fn merge_request_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> Result<ScmAuthor, CollabError> {
        Ok(self.fetch_merge_request_author(project_key, repo_slug, mr_id).await?)
    }
}

/// The review capability.
#[async_trait]
pub trait ReviewModel: Send + Sync {
    async fn review_diff(
        &self,
        diff: &str,
        template: &PromptTemplate,
    ) -> Result<String, CollabError>;

    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl ReviewModel for ReviewLlm {
    async fn review_diff(
        &self,
        diff: &str,
        template: &PromptTemplate,
    ) -> Result<String, CollabError> {
        Ok(ReviewLlm::review_diff(self, diff, template).await?)
    }

    fn provider_name(&self) -> &str {
        ReviewLlm::provider_name(self)
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}

/// Best-effort outbound notification.
#[async_trait]
pub trait ReviewMailer: Send + Sync {
    async fn notify(&self, email: &ReviewEmail) -> Result<DeliveryOutcome, CollabError>;
}

#[async_trait]
impl ReviewMailer for Notifier {
    async fn notify(&self, email: &ReviewEmail) -> Result<DeliveryOutcome, CollabError> {
        Ok(Notifier::notify(self, email).await?)
    }
}
