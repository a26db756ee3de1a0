//! Unified error kinds for LLM provider calls.

use thiserror::Error;

/// Convenient alias for gateway operations.
pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Endpoint is empty or not http(s).
    #[error("invalid llm endpoint: {0}")]
    InvalidEndpoint(String),

    /// The hosted-chat variant requires an API key.
    #[error("missing api key for hosted chat provider")]
    MissingApiKey,

    /// Prompt template does not contain the diff placeholder.
    #[error("prompt template is missing the {placeholder} placeholder")]
    InvalidTemplate { placeholder: &'static str },

    /// The request exceeded the configured deadline.
    #[error("timeout")]
    Timeout,

    /// Network-level failure (DNS, connect, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected by the provider (HTTP 401/403).
    #[error("unauthorized")]
    Unauthorized,

    /// Provider-side server error.
    #[error("provider server error: status {status}: {snippet}")]
    Upstream5xx { status: u16, snippet: String },

    /// Response could not be parsed into the expected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Provider answered success but produced no usable text.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Short classifier used in failure logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Timeout => "timeout",
            LlmError::Unauthorized => "unauthorized",
            LlmError::Upstream5xx { .. } => "upstream_5xx",
            LlmError::Malformed(_) => "malformed",
            LlmError::EmptyResponse => "empty_response",
            LlmError::Transport(_) => "transport",
            LlmError::InvalidEndpoint(_) | LlmError::MissingApiKey | LlmError::InvalidTemplate { .. } => {
                "internal"
            }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return LlmError::Timeout;
        }
        LlmError::Transport(e.to_string())
    }
}

/// First 240 chars of an error body, for log lines and error messages.
pub fn make_snippet(text: &str) -> String {
    text.chars().take(240).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_the_error_vocabulary() {
        assert_eq!(LlmError::Timeout.kind(), "timeout");
        assert_eq!(LlmError::EmptyResponse.kind(), "empty_response");
        assert_eq!(
            LlmError::Upstream5xx { status: 500, snippet: String::new() }.kind(),
            "upstream_5xx"
        );
        assert_eq!(LlmError::Malformed("x".into()).kind(), "malformed");
        assert_eq!(LlmError::Unauthorized.kind(), "unauthorized");
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(make_snippet(&long).len(), 240);
    }
}
