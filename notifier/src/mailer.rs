//! Delivery of rendered reviews to the external mail endpoint.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::errors::{NotifierError, NotifierResult};
use crate::render;

/// Runtime configuration for the notifier, assembled from the process
/// config snapshot at startup.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Mail endpoint URL the rendered review is POSTed to.
    pub endpoint: String,
    /// Sender address forwarded to the mail endpoint.
    pub from_address: String,
    /// When true, rendering still happens but no POST is made.
    pub opt_out: bool,
    /// POST deadline in seconds.
    pub timeout_secs: u64,
}

/// Everything needed to notify the author about one completed review.
#[derive(Debug, Clone)]
pub struct ReviewEmail {
    pub project_key: String,
    pub repo_slug: String,
    pub commit_id: Option<String>,
    pub mr_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub review_markdown: String,
}

/// What happened to one notification attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The mail endpoint accepted the message.
    Sent,
    /// No author email was known; the message was suppressed.
    Suppressed,
    /// `notifier.opt_out` is set; rendering ran, sending did not.
    OptedOut,
}

impl DeliveryOutcome {
    pub fn was_sent(self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// HTTP client wrapper for the mail endpoint.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    cfg: NotifierConfig,
}

impl Notifier {
    pub fn new(cfg: NotifierConfig) -> NotifierResult<Self> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(NotifierError::InvalidEndpoint(cfg.endpoint.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self { http, cfg })
    }

    /// Renders and (policy permitting) sends one review email.
    ///
    /// Rendering always runs so formatting problems surface even when the
    /// send is suppressed or opted out.
    #[instrument(skip_all, fields(project = %email.project_key, repo = %email.repo_slug))]
    pub async fn notify(&self, email: &ReviewEmail) -> NotifierResult<DeliveryOutcome> {
        let subject = render::subject(
            &email.project_key,
            &email.repo_slug,
            email.commit_id.as_deref(),
            email.mr_id,
        );
        let mailbody = render::review_html(&email.review_markdown);

        let Some(to) = email.author_email.as_deref().filter(|s| !s.trim().is_empty()) else {
            info!(%subject, "no author email; notification suppressed");
            return Ok(DeliveryOutcome::Suppressed);
        };

        if self.cfg.opt_out {
            info!(%subject, to, "notifier opt-out set; skipping send");
            return Ok(DeliveryOutcome::OptedOut);
        }

        let payload = MailPayload {
            from: &self.cfg.from_address,
            to,
            cc: "",
            subject: &subject,
            mailbody: &mailbody,
        };

        debug!(to, "POST {}", self.cfg.endpoint);
        let resp = self.http.post(&self.cfg.endpoint).json(&payload).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifierError::UpstreamStatus {
                status: status.as_u16(),
                snippet: text.chars().take(240).collect(),
            });
        }

        info!(to, %subject, "review email accepted by mail endpoint");
        Ok(DeliveryOutcome::Sent)
    }

    pub fn opt_out(&self) -> bool {
        self.cfg.opt_out
    }
}

/// Wire shape expected by the mail endpoint.
#[derive(Debug, Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    cc: &'a str,
    subject: &'a str,
    mailbody: &'a str,
}
