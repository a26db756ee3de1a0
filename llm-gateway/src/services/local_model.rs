//! Local model server back end (Ollama-compatible REST).
//!
//! Endpoints derived from `LlmConfig::endpoint`:
//! - POST {endpoint}/api/generate — synchronous generation (`stream=false`)
//! - GET  {endpoint}/api/tags     — connectivity probe

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::errors::{LlmError, LlmResult, make_snippet};
use crate::provider::ProbeReport;

/// Thin client for a local model server.
#[derive(Debug)]
pub struct LocalModelService {
    client: reqwest::Client,
    cfg: LlmConfig,
    url_generate: String,
    url_tags: String,
}

impl LocalModelService {
    pub fn new(cfg: LlmConfig) -> LlmResult<Self> {
        cfg.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        let base = cfg.endpoint.trim().trim_end_matches('/').to_string();
        let url_generate = format!("{base}/api/generate");
        let url_tags = format!("{base}/api/tags");

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "local model service initialized");

        Ok(Self {
            client,
            cfg,
            url_generate,
            url_tags,
        })
    }

    /// Non-streaming generation; the answer is the flat `response` field.
    pub async fn generate(&self, prompt: &str) -> LlmResult<String> {
        let started = Instant::now();
        let body = GenerateRequest {
            model: &self.cfg.model,
            prompt,
            stream: false,
        };

        debug!(model = %self.cfg.model, prompt_len = prompt.len(), "POST {}", self.url_generate);
        let resp = self.client.post(&self.url_generate).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(
                %status,
                %snippet,
                latency_ms = started.elapsed().as_millis(),
                "generate returned non-success status"
            );
            return Err(status_error(status.as_u16(), snippet));
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            LlmError::Malformed(format!("expected flat `response` field; ensure stream=false: {e}"))
        })?;

        if out.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            review_len = out.response.len(),
            "generation completed"
        );
        Ok(out.response)
    }

    /// Never fails; any failure is folded into `ok = false`.
    pub async fn probe(&self) -> ProbeReport {
        let started = Instant::now();
        let result = self.client.get(&self.url_tags).send().await;
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(resp) if resp.status().is_success() => {
                ProbeReport::ok(self.cfg.provider, latency_ms, "tags endpoint reachable")
            }
            Ok(resp) => ProbeReport::fail(
                self.cfg.provider,
                latency_ms,
                format!("tags endpoint returned status {}", resp.status()),
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
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    fn test_config(endpoint: String) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::LocalModelServer,
            endpoint,
            api_key: None,
            model: "qwen2.5-coder".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn reads_flat_response_field() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r####"{"model":"qwen2.5-coder","response":"### Review\nOne nit.","done":true}"####)
            .create_async()
            .await;

        let svc = LocalModelService::new(test_config(server.url())).unwrap();
        let review = svc.generate("review this").await.unwrap();
        assert_eq!(review, "### Review\nOne nit.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_response_field_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"   "}"#)
            .create_async()
            .await;

        let svc = LocalModelService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "empty_response");
    }

    #[tokio::test]
    async fn server_errors_map_to_upstream_5xx() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let svc = LocalModelService::new(test_config(server.url())).unwrap();
        assert_eq!(svc.generate("x").await.unwrap_err().kind(), "upstream_5xx");
    }

    #[tokio::test]
    async fn probe_reports_provider_name() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/api/tags").with_status(200).create_async().await;

        let svc = LocalModelService::new(test_config(server.url())).unwrap();
        let report = svc.probe().await;
        assert!(report.ok);
        assert_eq!(report.provider, "local_model_server");
    }
}
