//! Hosted chat-completion back end (OpenAI-compatible REST).
//!
//! Endpoints derived from `LlmConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions — non-streaming completion
//! - GET  {endpoint}/v1/models           — connectivity probe
//!
//! Constructor validation: the API key must be present and the endpoint must
//! start with http:// or https://.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::errors::{LlmError, LlmResult, make_snippet};
use crate::provider::ProbeReport;

/// Reviews want mostly-deterministic output.
const REVIEW_TEMPERATURE: f32 = 0.2;

/// Thin client for a hosted chat-completion API.
#[derive(Debug)]
pub struct HostedChatService {
    client: reqwest::Client,
    cfg: LlmConfig,
    url_chat: String,
    url_models: String,
}

impl HostedChatService {
    /// Builds the client with bearer auth in the default headers and the
    /// configured timeout.
    pub fn new(cfg: LlmConfig) -> LlmResult<Self> {
        cfg.validate()?;
        let api_key = cfg.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| LlmError::Malformed(format!("invalid api key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let base = cfg.endpoint.trim().trim_end_matches('/').to_string();
        let url_chat = format!("{base}/v1/chat/completions");
        let url_models = format!("{base}/v1/models");

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "hosted chat service initialized");

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_models,
        })
    }

    /// Sends one user message and returns the first choice's content.
    pub async fn generate(&self, prompt: &str) -> LlmResult<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: REVIEW_TEMPERATURE,
        };

        debug!(model = %self.cfg.model, prompt_len = prompt.len(), "POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                %status,
                %snippet,
                latency_ms = started.elapsed().as_millis(),
                "chat completion returned non-success status"
            );
            return Err(status_error(status.as_u16(), snippet));
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            LlmError::Malformed(format!("expected `choices[0].message.content`: {e}"))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            review_len = content.len(),
            "chat completion completed"
        );
        Ok(content)
    }

    /// Never fails; any failure is folded into `ok = false`.
    pub async fn probe(&self) -> ProbeReport {
        let started = Instant::now();
        let result = self.client.get(&self.url_models).send().await;
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(resp) if resp.status().is_success() => {
                ProbeReport::ok(self.cfg.provider, latency_ms, "models endpoint reachable")
            }
            Ok(resp) => ProbeReport::fail(
                self.cfg.provider,
                latency_ms,
                format!("models endpoint returned status {}", resp.status()),
            ),
            Err(e) => ProbeReport::fail(self.cfg.provider, latency_ms, e.to_string()),
        }
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

fn status_error(status: u16, snippet: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Unauthorized,
        500..=599 => LlmError::Upstream5xx { status, snippet },
        _ => LlmError::Transport(format!("unexpected status {status}: {snippet}")),
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    fn test_config(endpoint: String) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::HostedChat,
            endpoint,
            api_key: Some("sk-test".into()),
            model: "gpt-4o-mini".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn requires_api_key() {
        let mut cfg = test_config("https://api.example.com".into());
        cfg.api_key = None;
        assert!(matches!(HostedChatService::new(cfg), Err(LlmError::MissingApiKey)));
    }

    #[tokio::test]
    async fn parses_first_choice_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r###"{"choices":[{"message":{"content":"## Review\nLooks fine."}}]}"###)
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        let review = svc.generate("review this").await.unwrap();
        assert_eq!(review, "## Review\nLooks fine.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_choices_become_empty_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        let err = svc.generate("review this").await.unwrap_err();
        assert_eq!(err.kind(), "empty_response");
    }

    #[tokio::test]
    async fn whitespace_content_becomes_empty_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"  \n "}}]}"#)
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "empty_response");
    }

    #[tokio::test]
    async fn auth_and_server_errors_map_to_kinds() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "unauthorized");

        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "upstream_5xx");
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "malformed");
    }

    #[tokio::test]
    async fn probe_reflects_models_endpoint() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/v1/models").with_status(200).create_async().await;

        let svc = HostedChatService::new(test_config(server.url())).unwrap();
        let report = svc.probe().await;
        assert!(report.ok);
        assert_eq!(report.provider, "hosted_chat");
    }
}
