//! Error types for the stamping gate.

use thiserror::Error;

use nomina_store::StoreError;

/// Errors that can occur during gate operations.
#[derive(Debug, Error)]
pub enum GateError {
    /// Referenced period, user, or authorization does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is forbidden for the period's current state.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation would violate a uniqueness/idempotency invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for GateError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => GateError::NotFound(msg),
            StoreError::Conflict(msg) => GateError::Conflict(msg),
            StoreError::Immutable(msg) => GateError::PermissionDenied(msg),
            other => GateError::Store(other),
        }
    }
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
