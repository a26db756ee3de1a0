//! Provider selection and per-provider configuration.

use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

/// The two supported back ends. Selected once at config load; the pipeline
/// never branches on this again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Chat-completion HTTP API (OpenAI-compatible), bearer-authenticated.
    HostedChat,
    /// Local model server with a flat generate endpoint (Ollama-compatible).
    LocalModelServer,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::HostedChat => "hosted_chat",
            LlmProvider::LocalModelServer => "local_model_server",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hosted_chat" => Some(LlmProvider::HostedChat),
            "local_model_server" => Some(LlmProvider::LocalModelServer),
            _ => None,
        }
    }

    /// Endpoint used when `LLM_ENDPOINT` is unset.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::HostedChat => "https://api.openai.com",
            LlmProvider::LocalModelServer => "http://localhost:11434",
        }
    }

    /// Model used when `LLM_MODEL` is unset.
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::HostedChat => "gpt-4o-mini",
            LlmProvider::LocalModelServer => "qwen2.5-coder",
        }
    }
}

/// Immutable snapshot of everything a provider client needs.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Validates the parts both variants share. Variant-specific checks
    /// (api key presence) live in the service constructors.
    pub fn validate(&self) -> Result<(), LlmError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn provider_names_round_trip() {
        assert_eq!(LlmProvider::parse("hosted_chat"), Some(LlmProvider::HostedChat));
        assert_eq!(
            LlmProvider::parse("local_model_server"),
            Some(LlmProvider::LocalModelServer)
        );
        assert_eq!(LlmProvider::parse("openai"), None);
        assert_eq!(LlmProvider::HostedChat.as_str(), "hosted_chat");
    }

    #[test]
    fn endpoint_validation_requires_http_scheme() {
        let cfg = LlmConfig {
            provider: LlmProvider::LocalModelServer,
            endpoint: "localhost:11434".into(),
            api_key: None,
            model: "qwen2.5-coder".into(),
            timeout_secs: 60,
        };
        assert!(matches!(cfg.validate(), Err(LlmError::InvalidEndpoint(_))));
    }
}
