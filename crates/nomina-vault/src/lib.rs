//! # Nomina Vault
//!
//! The integrity store: content-addressed, versioned storage of fiscal byte
//! artifacts with verifiable integrity and soft deletion.
//!
//! ## Key Operations
//!
//! - [`DocumentVault::store`] - hash, dedup, version, and persist an artifact
//! - [`DocumentVault::get`] - read back with hash verification (flagged, not thrown)
//! - [`DocumentVault::verify_period_integrity`] - scan everything, report everything
//! - [`DocumentVault::delete`] - soft delete, gated by the fiscal seal

pub mod error;
pub mod vault;

pub use error::{Result, VaultError};
pub use vault::{
    DocumentVault, GetOptions, IntegrityReport, PeriodIntegrityReport, RetrievedDocument,
    StoreOptions,
};
