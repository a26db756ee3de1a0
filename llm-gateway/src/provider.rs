//! Provider facade with enum dispatch, no trait objects.
//!
//! The concrete back end is chosen once from config; everything downstream
//! holds a [`ReviewLlm`] and never looks at provider strings again.

use serde::Serialize;
use tracing::instrument;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::LlmResult;
use crate::prompt::PromptTemplate;
use crate::services::hosted_chat::HostedChatService;
use crate::services::local_model::LocalModelService;

/// Serializable connectivity snapshot, suitable for a `/health` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub ok: bool,
    pub provider: String,
    pub latency_ms: u128,
    pub detail: String,
}

impl ProbeReport {
    pub(crate) fn ok(provider: LlmProvider, latency_ms: u128, detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            provider: provider.as_str().to_string(),
            latency_ms,
            detail: detail.into(),
        }
    }

    pub(crate) fn fail(provider: LlmProvider, latency_ms: u128, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            provider: provider.as_str().to_string(),
            latency_ms,
            detail: detail.into(),
        }
    }
}

/// The review capability: one operation plus a probe, two back ends.
#[derive(Debug)]
pub enum ReviewLlm {
    HostedChat(HostedChatService),
    LocalModel(LocalModelService),
}

impl ReviewLlm {
    /// Selects and constructs the concrete back end from config.
    pub fn from_config(cfg: LlmConfig) -> LlmResult<Self> {
        match cfg.provider {
            LlmProvider::HostedChat => Ok(ReviewLlm::HostedChat(HostedChatService::new(cfg)?)),
            LlmProvider::LocalModelServer => {
                Ok(ReviewLlm::LocalModel(LocalModelService::new(cfg)?))
            }
        }
    }

    /// Renders the prompt from the template and asks the model for a
    /// markdown review of the diff.
    #[instrument(skip_all, fields(provider = %self.provider_name(), diff_len = diff.len()))]
    pub async fn review_diff(&self, diff: &str, template: &PromptTemplate) -> LlmResult<String> {
        let prompt = template.render(diff);
        match self {
            ReviewLlm::HostedChat(svc) => svc.generate(&prompt).await,
            ReviewLlm::LocalModel(svc) => svc.generate(&prompt).await,
        }
    }

    /// Connectivity probe for health reporting. Resilient: never fails.
    pub async fn probe(&self) -> ProbeReport {
        match self {
            ReviewLlm::HostedChat(svc) => svc.probe().await,
            ReviewLlm::LocalModel(svc) => svc.probe().await,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            ReviewLlm::HostedChat(_) => LlmProvider::HostedChat.as_str(),
            ReviewLlm::LocalModel(_) => LlmProvider::LocalModelServer.as_str(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ReviewLlm::HostedChat(svc) => svc.model(),
            ReviewLlm::LocalModel(svc) => svc.model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn facade_dispatches_to_the_configured_variant() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"review text"}"#)
            .create_async()
            .await;

        let llm = ReviewLlm::from_config(LlmConfig {
            provider: LlmProvider::LocalModelServer,
            endpoint: server.url(),
            api_key: None,
            model: "qwen2.5-coder".into(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(llm.provider_name(), "local_model_server");
        assert_eq!(llm.model(), "qwen2.5-coder");

        let review = llm
            .review_diff("+line", &PromptTemplate::default())
            .await
            .unwrap();
        assert_eq!(review, "review text");
    }
}
