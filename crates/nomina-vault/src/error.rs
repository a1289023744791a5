//! Error types for the integrity store.

use thiserror::Error;

use nomina_store::StoreError;

/// Errors that can occur during vault operations.
///
/// Integrity findings (hash mismatch, missing file) are NOT errors: they are
/// surfaced as flags in result payloads so that verification always completes
/// and reports everything it found.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Referenced document or owning record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is malformed for the record's current state
    /// (double delete, deleting a protected stamped artifact).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Duplicate content or a concurrent version race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for VaultError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => VaultError::NotFound(msg),
            StoreError::Conflict(msg) => VaultError::Conflict(msg),
            other => VaultError::Store(other),
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
