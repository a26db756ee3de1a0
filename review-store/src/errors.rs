//! Error types for the review store.

use thiserror::Error;

/// Convenient alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Root error type for the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure (open, statement, transaction).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization of structured columns failed.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A write violated a row invariant and was rejected before touching
    /// the database.
    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),

    /// The requested row does not exist.
    #[error("row not found: id {0}")]
    NotFound(i64),
}

impl StoreError {
    /// Short classifier used in failure logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            _ => "persistence",
        }
    }
}
