//! HTTP-facing error type for the ingress.
//!
//! Every error renders as `{"error": <kind>, "message": <text>}` where the
//! kind comes from the finite error vocabulary shared with the failure
//! logs, so callers and operators see the same classifiers everywhere.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::core::config::ConfigError;
use review_store::StoreError;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request validation ---
    /// 400 with a vocabulary kind (`missing_field`, `malformed`).
    #[error("{message}")]
    BadRequest {
        kind: &'static str,
        message: String,
    },

    /// 401; only produced by webhook signature checks.
    #[error("invalid or missing signature")]
    Unauthorized,

    /// 404 for absent resources on the read API.
    #[error("not found")]
    NotFound,

    /// 413 for uploads over the ceiling.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 415 for uploads that are not `.diff` / `.patch` files.
    #[error("{0}")]
    WrongFileType(String),

    // --- Downstream outcomes ---
    /// A pipeline failure surfaced on a synchronous endpoint; `kind` is the
    /// classifier the engine logged.
    #[error("{message}")]
    Pipeline { kind: String, message: String },

    /// Read-API store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Startup-only; never reaches a client in practice.
            AppError::Config(_) | AppError::Bind(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::WrongFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            AppError::Pipeline { kind, .. } => match kind.as_str() {
                "not_found" => StatusCode::NOT_FOUND,
                "missing_field" => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },

            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(&self) -> &str {
        match self {
            AppError::Config(_) => "ConfigInvalid",
            AppError::Bind(_) | AppError::Server(_) | AppError::Internal(_) => "internal",
            AppError::BadRequest { kind, .. } => kind,
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound => "not_found",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::WrongFileType(_) => "wrong_file_type",
            AppError::Pipeline { kind, .. } => kind,
            AppError::Store(e) => e.kind(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.error_kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Common axum rejections arrive as malformed requests.
impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest {
            kind: "malformed",
            message: err.to_string(),
        }
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest {
            kind: "malformed",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_kind_drives_the_status() {
        let not_found = AppError::Pipeline {
            kind: "not_found".into(),
            message: "commit unknown".into(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let timeout = AppError::Pipeline {
            kind: "timeout".into(),
            message: "llm deadline exceeded".into(),
        };
        assert_eq!(timeout.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn boundary_errors_use_their_reserved_statuses() {
        assert_eq!(
            AppError::PayloadTooLarge("11 MiB".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::WrongFileType("txt".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }
}
