//! # Nomina Store
//!
//! Storage abstraction and implementations for the nomina fiscal ledger.
//!
//! ## Components
//!
//! - [`Store`] - async trait over relational ledger state
//! - [`SqliteStore`] - primary backend (rusqlite, bundled)
//! - [`MemoryStore`] - in-memory backend for tests
//! - [`BlobStore`] / [`FsBlobStore`] / [`MemoryBlobStore`] - byte storage for
//!   fiscal artifacts, keyed by deterministic locators
//!
//! ## Atomicity
//!
//! Multi-row mutations (supersession, document versioning, authorization)
//! run in a single transaction with their audit record, and re-verify the
//! preconditions inside that transaction. Single-active-row invariants are
//! additionally enforced by partial unique indexes in the schema.

pub mod blob;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use blob::{document_locator, BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{NewDocument, Store, SupersedeRequest};
