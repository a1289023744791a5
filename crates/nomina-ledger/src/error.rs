//! Error types for the version ledger.

use thiserror::Error;

use nomina_core::ValidationError;
use nomina_store::StoreError;

/// Errors that can occur during ledger operations.
///
/// Precondition failures are fatal for the caller: they indicate a logic or
/// permission violation, not a transient fault.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced receipt, snapshot, or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is legal in general but forbidden for this record's
    /// current state. The message names the state and the remedy.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation would violate a uniqueness/idempotency invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed figures, rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The parent-pointer chain is damaged (cycle or non-decreasing version).
    #[error("corrupt version chain: {0}")]
    CorruptChain(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => LedgerError::NotFound(msg),
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            // The transactional re-check rejected the mutation: same legal
            // constraint as the advisory check, reported the same way.
            StoreError::Immutable(msg) => LedgerError::PermissionDenied(msg),
            other => LedgerError::Store(other),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
