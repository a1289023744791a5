//! # Nomina Ledger
//!
//! The version ledger: enforces that financial history is append-only and
//! that fiscally sealed receipts are untouchable.
//!
//! ## Key Operations
//!
//! - [`VersionLedger::can_modify`] - advisory mutability check
//! - [`VersionLedger::recalculate`] - atomic supersede-and-create-successor
//! - [`VersionLedger::get_version_chain`] - parent-pointer audit walk
//! - [`VersionLedger::compare_versions`] - line-item diff between versions
//! - [`VersionLedger::record_stamp_outcome`] - ingest external stamp facts

pub mod error;
pub mod ledger;

pub use error::{LedgerError, Result};
pub use ledger::{ModifyCheck, StampOutcome, VersionLedger};
