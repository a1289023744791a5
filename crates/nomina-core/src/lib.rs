//! # Nomina Core
//!
//! Pure primitives for the nomina fiscal ledger: receipts, version snapshots,
//! fiscal documents, and stamping authorizations.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over payroll data structures.
//!
//! ## Key Types
//!
//! - [`Receipt`] - One computed payroll result for a (period, employee) pair
//! - [`VersionSnapshot`] - Immutable historical copy captured at supersession
//! - [`FiscalDocument`] - Content-addressed fiscal artifact metadata
//! - [`StampingAuthorization`] - Period-scoped permission to stamp
//! - [`ContentHash`] - SHA-256 content address of document bytes
//!
//! ## Immutability
//!
//! A receipt whose stamp status is [`StampStatus::Stamped`] is fiscally
//! sealed: no financial field may ever change, and mutation is modeled as
//! superseding the row with a new version. See [`Receipt::is_fiscally_sealed`].

pub mod audit;
pub mod authorization;
pub mod document;
pub mod error;
pub mod figures;
pub mod hash;
pub mod period;
pub mod receipt;
pub mod snapshot;
pub mod types;

pub use audit::{AuditAction, AuditRecord};
pub use authorization::{AuthorizeCapability, Permission, Role, StampingAuthorization, User};
pub use document::{DocumentKind, FiscalDocument};
pub use error::{CoreError, ValidationError};
pub use figures::{LineKind, PayConcept, PayFigures};
pub use hash::ContentHash;
pub use period::{PayPeriod, PeriodStatus, StampingCredentials};
pub use receipt::{Receipt, ReceiptLine, ReceiptStatus, Stamp, StampStatus};
pub use snapshot::{compare_snapshots, LineChange, SnapshotReason, VersionDiff, VersionSnapshot};
pub use types::{
    AuthorizationId, CompanyId, DocumentId, EmployeeId, PeriodId, ReceiptId, SnapshotId, UserId,
};
