//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (duplicate username, id, token).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid data in storage or an invalid key.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Errors caused by the request itself rather than the backend.
    ///
    /// A failover composite must surface these instead of retrying elsewhere.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict(_) | StoreError::NotFound(_) | StoreError::InvalidData(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
