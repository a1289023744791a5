//! Blob storage for fiscal artifact bytes.
//!
//! Metadata lives in the relational store; the bytes live here, at a
//! deterministic locator derived from owner, kind, and version. Blobs are
//! written once and never overwritten: a new version gets a new locator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use nomina_core::{CompanyId, DocumentKind, PeriodId, ReceiptId};

use crate::error::{Result, StoreError};

/// Deterministic, collision-free locator for a document version.
pub fn document_locator(
    company_id: &CompanyId,
    period_id: &PeriodId,
    owner: &ReceiptId,
    kind: DocumentKind,
    version: u32,
) -> String {
    format!(
        "{}/{}/{}/{}/v{}.bin",
        company_id,
        period_id,
        owner,
        kind.as_str(),
        version
    )
}

/// Byte storage keyed by locator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes at the locator. Fails if the locator is already taken:
    /// locators are version-scoped and never reused.
    async fn put(&self, locator: &str, bytes: &[u8]) -> Result<()>;

    /// Read bytes. `None` when the blob is missing - during integrity
    /// scans a missing file is a finding, not an error.
    async fn get(&self, locator: &str) -> Result<Option<Bytes>>;

    /// Whether a blob exists at the locator.
    async fn exists(&self, locator: &str) -> Result<bool>;
}

/// Filesystem-backed blob store rooted at a directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, locator: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(locator);
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            if path.exists() {
                return Err(StoreError::Conflict(format!(
                    "blob already exists at {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::InvalidData(format!("spawn_blocking failed: {}", e)))?
    }

    async fn get(&self, locator: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(locator);
        tokio::task::spawn_blocking(move || match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        })
        .await
        .map_err(|e| StoreError::InvalidData(format!("spawn_blocking failed: {}", e)))?
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        let path = self.path_for(locator);
        tokio::task::spawn_blocking(move || Ok(path.exists()))
            .await
            .map_err(|e| StoreError::InvalidData(format!("spawn_blocking failed: {}", e)))?
    }
}

/// In-memory blob store for tests.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Corrupt a stored blob in place. Test helper for integrity scans.
    pub fn corrupt(&self, locator: &str, bytes: &[u8]) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(locator.to_string(), Bytes::from(bytes.to_vec()));
    }

    /// Drop a blob entirely. Test helper for missing-file findings.
    pub fn remove(&self, locator: &str) {
        self.blobs.write().expect("lock poisoned").remove(locator);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, locator: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))?;
        if blobs.contains_key(locator) {
            return Err(StoreError::Conflict(format!(
                "blob already exists at {}",
                locator
            )));
        }
        blobs.insert(locator.to_string(), Bytes::from(bytes.to_vec()));
        Ok(())
    }

    async fn get(&self, locator: &str) -> Result<Option<Bytes>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))?;
        Ok(blobs.get(locator).cloned())
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))?;
        Ok(blobs.contains_key(locator))
    }
}
