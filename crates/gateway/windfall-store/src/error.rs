//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while creating the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API key not found.
    #[error("API key not found: {0}")]
    KeyNotFound(i64),

    /// Schema initialization error.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid stored data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Lock poisoning error.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        StoreError::Schema(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        StoreError::InvalidData(msg.into())
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(msg: impl Into<String>) -> Self {
        StoreError::LockPoisoned(msg.into())
    }
}
