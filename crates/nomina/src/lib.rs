//! # Nomina
//!
//! The unified API for the nomina system - payroll receipts that become
//! legally immutable tax documents once fiscally stamped.
//!
//! ## Overview
//!
//! Nomina guarantees that a stamped receipt can never be mutated by any
//! code path, while pre-stamp recalculation stays possible without losing
//! history:
//!
//! - **Receipts**: one computed payroll result per (period, employee). A
//!   new value is always a new row chained to its predecessor.
//! - **Version ledger**: append-only supersession protocol with snapshots
//!   and parent-pointer lineage.
//! - **Integrity store**: content-addressed (SHA-256), versioned fiscal
//!   artifacts with soft deletion and verifiable integrity.
//! - **Stamping gate**: a period-level, one-way authorization switch in
//!   front of the external stamping authority.
//! - **Readiness**: an aggregate check that reports every blocking issue
//!   at once.
//!
//! ## Key Concepts
//!
//! - **Fiscal seal**: once a receipt's stamp status is `Stamped`, the
//!   receipt and its stamped XML are frozen until the stamp is cancelled
//!   externally.
//! - **Supersede, never update**: recalculation snapshots the current
//!   version, deactivates it, and inserts the successor atomically.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nomina::{KernelConfig, PayrollKernel};
//! use nomina::store::{FsBlobStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("nomina.db").unwrap();
//!     let blobs = FsBlobStore::new("blobs");
//!     let kernel = PayrollKernel::new(store, blobs, KernelConfig::default());
//!
//!     // let receipt = kernel
//!     //     .create_receipt(&period_id, &employee_id, &figures, &actor)
//!     //     .await
//!     //     .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `nomina::core` - domain primitives (Receipt, ContentHash, etc.)
//! - `nomina::store` - storage abstraction, SQLite, blob stores
//! - `nomina::ledger` - version ledger service
//! - `nomina::vault` - integrity store service
//! - `nomina::gate` - stamping gate service

pub mod error;
pub mod kernel;
pub mod readiness;

// Re-export component crates
pub use nomina_core as core;
pub use nomina_gate as gate;
pub use nomina_ledger as ledger;
pub use nomina_store as store;
pub use nomina_vault as vault;

// Re-export main types for convenience
pub use error::{KernelError, Result};
pub use kernel::{KernelConfig, PayrollKernel};
pub use readiness::{
    Issue, IssueCode, PacSummary, ReadinessAggregator, ReceiptTally, Severity, StampReadiness,
};

// Re-export commonly used core types
pub use nomina_core::{
    ContentHash, DocumentKind, EmployeeId, PayConcept, PayFigures, PayPeriod, PeriodId,
    PeriodStatus, Receipt, ReceiptId, ReceiptStatus, SnapshotReason, Stamp, StampStatus, UserId,
};
pub use nomina_ledger::{ModifyCheck, StampOutcome};
pub use nomina_vault::{GetOptions, StoreOptions};
