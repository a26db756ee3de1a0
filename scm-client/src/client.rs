//! Authenticated HTTP client for the source-control server.
//!
//! Endpoints used (Bitbucket-Server-style REST, which matches the webhook
//! payloads the ingress accepts):
//!   * GET /rest/api/1.0/projects/{key}/repos/{slug}/commits/{id}/diff
//!   * GET /rest/api/1.0/projects/{key}/repos/{slug}/pull-requests/{id}.diff
//!   * GET /rest/api/1.0/projects/{key}/repos/{slug}/commits/{id}
//!   * GET /rest/api/1.0/projects/{key}/repos/{slug}/pull-requests/{id}

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::errors::{ScmError, ScmResult};

/// Diff bodies above this are truncated before they reach the pipeline.
/// Truncation is logged but is not an error.
const MAX_DIFF_BYTES: usize = 5 * 1024 * 1024;

/// Runtime configuration for the SCM client, assembled from the process
/// config snapshot at startup.
#[derive(Debug, Clone)]
pub struct ScmConfig {
    /// Server base, e.g. "https://git.example.com".
    pub base_url: String,
    /// Bearer token (HTTP access token).
    pub token: String,
    /// When false, certificate verification is disabled for SCM traffic.
    pub ssl_verify: bool,
    /// Optional custom trust store (PEM bundle).
    pub ca_bundle_path: Option<PathBuf>,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
}

/// Commit or merge-request author, best-effort. A missing email is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScmAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// HTTP client wrapper over the source-control server REST API.
#[derive(Debug, Clone)]
pub struct ScmClient {
    http: reqwest::Client,
    base: String,
}

impl ScmClient {
    /// Builds the client: bearer auth default header, request timeout, and
    /// the TLS posture from config.
    pub fn new(cfg: &ScmConfig) -> ScmResult<Self> {
        let base = cfg.base_url.trim().trim_end_matches('/');
        if base.is_empty() || !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ScmError::InvalidEndpoint(cfg.base_url.clone()));
        }

        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {}", cfg.token))
            .map_err(|e| ScmError::Decode(format!("invalid token header: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers);

        if !cfg.ssl_verify {
            warn!("scm certificate verification is DISABLED");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &cfg.ca_bundle_path {
            let pem = std::fs::read(path).map_err(|e| ScmError::CaBundle {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| ScmError::CaBundle {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build()?;
        Ok(Self {
            http,
            base: base.to_string(),
        })
    }

    fn repo_url(&self, project_key: &str, repo_slug: &str) -> String {
        format!("{}/rest/api/1.0/projects/{}/repos/{}", self.base, project_key, repo_slug)
    }

    /// Fetches the unified diff for a single commit.
    #[instrument(skip_all, fields(project = %project_key, repo = %repo_slug))]
    pub async fn fetch_commit_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> ScmResult<String> {
        let url = format!("{}/commits/{}/diff", self.repo_url(project_key, repo_slug), commit_id);
        self.fetch_diff(&url).await
    }

    /// Fetches the unified diff for a merge request.
    #[instrument(skip_all, fields(project = %project_key, repo = %repo_slug))]
    pub async fn fetch_merge_request_diff(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> ScmResult<String> {
        let url = format!("{}/pull-requests/{}.diff", self.repo_url(project_key, repo_slug), mr_id);
        self.fetch_diff(&url).await
    }

    async fn fetch_diff(&self, url: &str) -> ScmResult<String> {
        debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .header(header::ACCEPT, "text/plain")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScmError::from_status(status.as_u16()));
        }

        let body = resp.text().await?;
        let (diff, truncated) = truncate_utf8(body, MAX_DIFF_BYTES);
        if truncated {
            warn!(%url, limit = MAX_DIFF_BYTES, "diff body exceeded ceiling; truncated");
        }
        Ok(diff)
    }

    /// Resolves the author of a commit. Best-effort: a commit with no email
    /// on record yields a name-only author.
    #[instrument(skip_all, fields(project = %project_key, repo = %repo_slug))]
    pub async fn fetch_commit_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        commit_id: &str,
    ) -> ScmResult<ScmAuthor> {
        let url = format!("{}/commits/{}", self.repo_url(project_key, repo_slug), commit_id);
        debug!("GET {url}");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScmError::from_status(status.as_u16()));
        }

        let commit: CommitResponse = resp
            .json()
            .await
            .map_err(|e| ScmError::Decode(format!("commit metadata: {e}")))?;

        Ok(ScmAuthor {
            name: commit.author.as_ref().and_then(|a| a.name.clone()),
            email: commit.author.and_then(|a| a.email_address),
        })
    }

    /// Resolves the author of a merge request.
    #[instrument(skip_all, fields(project = %project_key, repo = %repo_slug))]
    pub async fn fetch_merge_request_author(
        &self,
        project_key: &str,
        repo_slug: &str,
        mr_id: i64,
    ) -> ScmResult<ScmAuthor> {
        let url = format!("{}/pull-requests/{}", self.repo_url(project_key, repo_slug), mr_id);
        debug!("GET {url}");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScmError::from_status(status.as_u16()));
        }

        let pr: PullRequestResponse = resp
            .json()
            .await
            .map_err(|e| ScmError::Decode(format!("pull request metadata: {e}")))?;

        let user = pr.author.and_then(|a| a.user);
        Ok(ScmAuthor {
            name: user.as_ref().and_then(|u| u.display_name.clone()),
            email: user.and_then(|u| u.email_address),
        })
    }
}

/// Truncates at the last char boundary at or below `max` bytes. A body of
/// exactly `max` bytes passes through untouched.
fn truncate_utf8(s: String, max: usize) -> (String, bool) {
    if s.len() <= max {
        return (s, false);
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut s = s;
    s.truncate(end);
    (s, true)
}

/* ==========================
Response payloads
========================== */

#[derive(Debug, Deserialize)]
struct CommitResponse {
    author: Option<CommitPerson>,
}

#[derive(Debug, Deserialize)]
struct CommitPerson {
    name: Option<String>,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    author: Option<PrParticipant>,
}

#[derive(Debug, Deserialize)]
struct PrParticipant {
    user: Option<PrUser>,
}

#[derive(Debug, Deserialize)]
struct PrUser {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    fn test_config(base: String) -> ScmConfig {
        ScmConfig {
            base_url: base,
            token: "secret-token".into(),
            ssl_verify: true,
            ca_bundle_path: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn truncation_keeps_bodies_at_the_ceiling() {
        let (s, cut) = truncate_utf8("abcdef".into(), 6);
        assert_eq!((s.as_str(), cut), ("abcdef", false));

        let (s, cut) = truncate_utf8("abcdefg".into(), 6);
        assert_eq!((s.as_str(), cut), ("abcdef", true));

        // Multi-byte char straddling the cut is dropped whole.
        let (s, cut) = truncate_utf8("ab\u{00e9}".into(), 3);
        assert_eq!((s.as_str(), cut), ("ab", true));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ScmClient::new(&test_config("git.example.com".into())).unwrap_err();
        assert!(matches!(err, ScmError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn commit_diff_success_passes_body_through() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/commits/abc123/diff")
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_body("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n")
            .create_async()
            .await;

        let client = ScmClient::new(&test_config(server.url())).unwrap();
        let diff = client.fetch_commit_diff("ACME", "widgets", "abc123").await.unwrap();
        assert!(diff.contains("+new"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/commits/gone/diff")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/pull-requests/7.diff")
            .with_status(502)
            .create_async()
            .await;

        let client = ScmClient::new(&test_config(server.url())).unwrap();

        let err = client.fetch_commit_diff("ACME", "widgets", "gone").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = client.fetch_merge_request_diff("ACME", "widgets", 7).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_5xx");
    }

    #[tokio::test]
    async fn commit_author_without_email_is_name_only() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/commits/abc123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"abc123","author":{"name":"Dana Developer"}}"#)
            .create_async()
            .await;

        let client = ScmClient::new(&test_config(server.url())).unwrap();
        let author = client.fetch_commit_author("ACME", "widgets", "abc123").await.unwrap();
        assert_eq!(author.name.as_deref(), Some("Dana Developer"));
        assert_eq!(author.email, None);
    }

    #[tokio::test]
    async fn merge_request_author_reads_nested_user() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/pull-requests/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":42,"author":{"user":{"displayName":"Lee","emailAddress":"lee@example.com"}}}"#,
            )
            .create_async()
            .await;

        let client = ScmClient::new(&test_config(server.url())).unwrap();
        let author = client.fetch_merge_request_author("ACME", "widgets", 42).await.unwrap();
        assert_eq!(author.name.as_deref(), Some("Lee"));
        assert_eq!(author.email.as_deref(), Some("lee@example.com"));
    }

    #[tokio::test]
    async fn malformed_author_json_is_a_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/rest/api/1.0/projects/ACME/repos/widgets/commits/abc123")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = ScmClient::new(&test_config(server.url())).unwrap();
        let err = client.fetch_commit_author("ACME", "widgets", "abc123").await.unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}
