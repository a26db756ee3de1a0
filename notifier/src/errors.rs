//! Error types for the notification path.
//!
//! A failed send is deliberately a soft failure: the pipeline records
//! `email_sent = false` and carries on, so these errors only ever reach log
//! lines and the synchronous endpoints' response metadata.

use thiserror::Error;

pub type NotifierResult<T> = Result<T, NotifierError>;

#[derive(Debug, Error)]
pub enum NotifierError {
    /// Mail endpoint is empty or not http(s).
    #[error("invalid notifier endpoint: {0}")]
    InvalidEndpoint(String),

    /// The POST exceeded the configured deadline.
    #[error("timeout")]
    Timeout,

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The mail endpoint answered with a non-success status.
    #[error("mail endpoint returned status {status}: {snippet}")]
    UpstreamStatus { status: u16, snippet: String },
}

impl NotifierError {
    pub fn kind(&self) -> &'static str {
        match self {
            NotifierError::Timeout => "timeout",
            NotifierError::Transport(_) => "transport",
            NotifierError::UpstreamStatus { status, .. } if *status >= 500 => "upstream_5xx",
            NotifierError::UpstreamStatus { .. } => "transport",
            NotifierError::InvalidEndpoint(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for NotifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return NotifierError::Timeout;
        }
        NotifierError::Transport(e.to_string())
    }
}
