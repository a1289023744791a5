//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error for persisted values.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation would violate a uniqueness/idempotency invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record is in a state that forbids the mutation. Detected inside
    /// the mutating transaction, after the advisory check already passed.
    #[error("immutable: {0}")]
    Immutable(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error from the blob store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
