//! Error kinds for source-control server calls.
//!
//! The pipeline branches on these (404 is handled differently from a 5xx),
//! so the mapping from transport errors and HTTP statuses lives here in one
//! place rather than at each call site.

use thiserror::Error;

/// Convenient alias for SCM operations.
pub type ScmResult<T> = Result<T, ScmError>;

#[derive(Debug, Error)]
pub enum ScmError {
    /// Base URL is empty or not http(s).
    #[error("invalid scm base url: {0}")]
    InvalidEndpoint(String),

    /// Custom trust store could not be loaded at construction.
    #[error("cannot load ca bundle {path}: {reason}")]
    CaBundle { path: String, reason: String },

    /// The entity (commit, merge request) does not exist upstream.
    #[error("not found")]
    NotFound,

    /// The configured token was rejected (HTTP 401/403).
    #[error("unauthorized")]
    Unauthorized,

    /// The server answered with a 5xx.
    #[error("upstream server error: status {0}")]
    Upstream5xx(u16),

    /// Any other non-success status.
    #[error("unexpected http status {0}")]
    UnexpectedStatus(u16),

    /// The request exceeded the configured deadline.
    #[error("timeout")]
    Timeout,

    /// Network-level failure (DNS, connect, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Metadata response did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ScmError {
    /// Short classifier used in failure logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ScmError::NotFound => "not_found",
            ScmError::Unauthorized => "unauthorized",
            ScmError::Upstream5xx(_) => "upstream_5xx",
            ScmError::Timeout => "timeout",
            ScmError::Decode(_) => "malformed",
            ScmError::Transport(_) | ScmError::UnexpectedStatus(_) => "transport",
            ScmError::InvalidEndpoint(_) | ScmError::CaBundle { .. } => "internal",
        }
    }

    /// Maps a response status that was already known to be non-success.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ScmError::NotFound,
            401 | 403 => ScmError::Unauthorized,
            500..=599 => ScmError::Upstream5xx(status),
            other => ScmError::UnexpectedStatus(other),
        }
    }
}

impl From<reqwest::Error> for ScmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ScmError::Timeout;
        }
        ScmError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_distinguishes_404_from_5xx() {
        assert!(matches!(ScmError::from_status(404), ScmError::NotFound));
        assert!(matches!(ScmError::from_status(401), ScmError::Unauthorized));
        assert!(matches!(ScmError::from_status(403), ScmError::Unauthorized));
        assert!(matches!(ScmError::from_status(500), ScmError::Upstream5xx(500)));
        assert!(matches!(ScmError::from_status(503), ScmError::Upstream5xx(503)));
        assert!(matches!(ScmError::from_status(418), ScmError::UnexpectedStatus(418)));
    }

    #[test]
    fn kinds_match_the_error_vocabulary() {
        assert_eq!(ScmError::NotFound.kind(), "not_found");
        assert_eq!(ScmError::Upstream5xx(502).kind(), "upstream_5xx");
        assert_eq!(ScmError::Timeout.kind(), "timeout");
        assert_eq!(ScmError::Transport("reset".into()).kind(), "transport");
        assert_eq!(ScmError::Decode("bad json".into()).kind(), "malformed");
    }
}
