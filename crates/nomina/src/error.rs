//! Error types for the kernel facade.

use thiserror::Error;

use nomina_core::ValidationError;
use nomina_gate::GateError;
use nomina_ledger::LedgerError;
use nomina_store::StoreError;
use nomina_vault::VaultError;

/// Errors that can occur during kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Version ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Integrity store error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Stamping gate error.
    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Malformed input rejected before any mutation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate record or invariant violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
