//! Error types for nomina core.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core errors for parsing and constructing domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("unknown receipt status: {0}")]
    UnknownReceiptStatus(String),

    #[error("unknown stamp status: {0}")]
    UnknownStampStatus(String),

    #[error("unknown document kind: {0}")]
    UnknownDocumentKind(String),

    #[error("unknown snapshot reason: {0}")]
    UnknownSnapshotReason(String),

    #[error("unknown period status: {0}")]
    UnknownPeriodStatus(String),

    #[error("unknown line kind: {0}")]
    UnknownLineKind(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown audit action: {0}")]
    UnknownAuditAction(String),
}

/// Validation errors for payroll figures.
///
/// Rejected before any mutation begins: a recalculation with invalid input
/// must leave the ledger untouched.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worked days {0} outside the valid range 0..=31")]
    WorkedDaysOutOfRange(Decimal),

    #[error("figures contain no perception lines")]
    EmptyPerceptions,

    #[error("line {index}: concept code is empty")]
    EmptyConceptCode { index: usize },

    #[error("concept {code}: negative amount {amount}")]
    NegativeAmount { code: String, amount: Decimal },

    #[error("duplicate concept code {code} within one side")]
    DuplicateConceptCode { code: String },
}
