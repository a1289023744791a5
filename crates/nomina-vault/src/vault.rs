//! The document vault: durable, hash-verifiable, versioned storage of
//! fiscal byte artifacts.
//!
//! Bytes are content-addressed by SHA-256 and written to the blob store
//! before the metadata transaction; the metadata insert and the
//! deactivation of the previous version commit atomically. Documents are
//! superseded or soft-deleted, never physically removed.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use nomina_core::{
    AuditAction, AuditRecord, ContentHash, DocumentId, DocumentKind, FiscalDocument, PeriodId,
    ReceiptId, UserId,
};
use nomina_store::{document_locator, BlobStore, NewDocument, Store};

use crate::error::{Result, VaultError};

/// Options for [`DocumentVault::store`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub actor_id: UserId,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Allow storing bytes identical to the current active version.
    /// Off by default: an unchanged re-upload is usually an accident, not
    /// a new fiscal event.
    pub allow_duplicate: bool,
}

impl StoreOptions {
    pub fn new(actor_id: UserId) -> Self {
        Self {
            actor_id,
            file_name: None,
            mime_type: None,
            allow_duplicate: false,
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn allow_duplicate(mut self, allow: bool) -> Self {
        self.allow_duplicate = allow;
        self
    }
}

/// Options for [`DocumentVault::get`].
#[derive(Debug, Clone)]
pub struct GetOptions {
    pub verify_integrity: bool,
    pub include_deleted: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            verify_integrity: true,
            include_deleted: false,
        }
    }
}

/// A document plus its bytes as read back from storage.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub document: FiscalDocument,
    pub bytes: Bytes,
    /// Whether the recomputed SHA-256 matched the stored hash. A mismatch
    /// does not fail the read: diagnostics must stay possible on corrupted
    /// data, and callers that require guaranteed integrity check this flag.
    /// `true` when verification was skipped.
    pub integrity_valid: bool,
}

/// Per-document result of an integrity scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub document_id: DocumentId,
    pub storage_locator: String,
    pub file_exists: bool,
    pub is_valid: bool,
    pub expected_hash: ContentHash,
    /// Recomputed hash; `None` when the file is missing.
    pub actual_hash: Option<ContentHash>,
}

/// Aggregate result of scanning every active document of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodIntegrityReport {
    pub period_id: PeriodId,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub reports: Vec<IntegrityReport>,
}

impl PeriodIntegrityReport {
    pub fn all_valid(&self) -> bool {
        self.failed == 0
    }
}

/// The integrity store service.
pub struct DocumentVault<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
}

impl<S: Store, B: BlobStore> DocumentVault<S, B> {
    pub fn new(store: Arc<S>, blobs: Arc<B>) -> Self {
        Self { store, blobs }
    }

    /// Store a fiscal artifact for a receipt.
    ///
    /// Hashing and the blob write happen outside the metadata transaction;
    /// the metadata insert, the deactivation of the previous version, and
    /// the audit record commit atomically. The assigned version is
    /// re-verified inside that transaction, so a concurrent store of the
    /// same (owner, kind) fails loudly instead of colliding.
    pub async fn store(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
        bytes: &[u8],
        options: StoreOptions,
    ) -> Result<FiscalDocument> {
        let content_hash = ContentHash::digest(bytes);

        if !options.allow_duplicate {
            if let Some(existing) = self.store.get_active_document(owner, kind).await? {
                if existing.content_hash == content_hash {
                    return Err(VaultError::Conflict(format!(
                        "identical content ({}) already stored as {} v{} - pass \
                         allow_duplicate to record it as a new fiscal event",
                        content_hash.short(),
                        kind,
                        existing.version
                    )));
                }
            }
        }

        let receipt = self
            .store
            .get_receipt(owner)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("receipt {}", owner)))?;
        let period = self
            .store
            .get_period(&receipt.period_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("period {}", receipt.period_id)))?;

        let version = self.store.next_document_version(owner, kind).await?;
        let locator = document_locator(&period.company_id, &period.id, owner, kind, version);

        self.blobs.put(&locator, bytes).await?;

        let now = Utc::now();
        let document = NewDocument {
            id: DocumentId::new(),
            owner_receipt_id: *owner,
            kind,
            version,
            content_hash,
            storage_locator: locator,
            byte_size: bytes.len() as u64,
            file_name: options.file_name,
            mime_type: options.mime_type,
            created_by: options.actor_id,
            created_at: now,
            allow_duplicate: options.allow_duplicate,
        };

        // Truncated hash prefix only: audit must never leak content.
        let audit = AuditRecord::new(
            AuditAction::DocumentStored,
            document.id.as_uuid(),
            options.actor_id,
            json!({
                "owner_receipt_id": owner.to_string(),
                "kind": kind.as_str(),
                "version": version,
                "hash_prefix": content_hash.short(),
                "byte_size": bytes.len(),
            }),
            now,
        )
        .with_period(receipt.period_id);

        let stored = self.store.insert_document_version(document, &audit).await?;

        tracing::info!(
            document = %stored.id,
            owner = %owner,
            kind = %kind,
            version = stored.version,
            hash = %content_hash.short(),
            "fiscal document stored"
        );

        Ok(stored)
    }

    /// Retrieve a document's metadata and bytes.
    ///
    /// A hash mismatch does not fail the call: it is reported via
    /// `integrity_valid` (plus a logged error) so read access for
    /// diagnostics remains possible on corruption.
    pub async fn get(&self, id: &DocumentId, options: GetOptions) -> Result<RetrievedDocument> {
        let document = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("document {}", id)))?;

        if document.is_deleted() && !options.include_deleted {
            return Err(VaultError::NotFound(format!(
                "document {} has been deleted",
                id
            )));
        }

        let bytes = self
            .blobs
            .get(&document.storage_locator)
            .await?
            .ok_or_else(|| {
                VaultError::NotFound(format!(
                    "document {} bytes missing at {}",
                    id, document.storage_locator
                ))
            })?;

        let integrity_valid = if options.verify_integrity {
            let recomputed = ContentHash::digest(&bytes);
            let valid = recomputed == document.content_hash;
            if !valid {
                tracing::error!(
                    document = %id,
                    expected = %document.content_hash.short(),
                    actual = %recomputed.short(),
                    "document content hash mismatch"
                );
            }
            valid
        } else {
            true
        };

        Ok(RetrievedDocument {
            document,
            bytes,
            integrity_valid,
        })
    }

    /// Recompute and verify the hash of a single document.
    ///
    /// A missing file or mismatched hash is a finding in the report, never
    /// an error: integrity scanning must survive partial storage failures.
    pub async fn verify_integrity(&self, id: &DocumentId) -> Result<IntegrityReport> {
        let document = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("document {}", id)))?;

        Ok(self.verify_document(&document).await?)
    }

    /// Verify every active document of a period, returning per-document
    /// findings and aggregate pass/fail counts.
    pub async fn verify_period_integrity(
        &self,
        period_id: &PeriodId,
    ) -> Result<PeriodIntegrityReport> {
        let documents = self
            .store
            .list_active_documents_for_period(period_id)
            .await?;

        let mut reports = Vec::with_capacity(documents.len());
        for document in &documents {
            reports.push(self.verify_document(document).await?);
        }

        let passed = reports.iter().filter(|r| r.is_valid).count();
        let report = PeriodIntegrityReport {
            period_id: *period_id,
            total: reports.len(),
            passed,
            failed: reports.len() - passed,
            reports,
        };

        if report.failed > 0 {
            tracing::warn!(
                period = %period_id,
                failed = report.failed,
                total = report.total,
                "period integrity scan found failures"
            );
        }

        Ok(report)
    }

    async fn verify_document(
        &self,
        document: &FiscalDocument,
    ) -> std::result::Result<IntegrityReport, nomina_store::StoreError> {
        match self.blobs.get(&document.storage_locator).await? {
            Some(bytes) => {
                let actual = ContentHash::digest(&bytes);
                Ok(IntegrityReport {
                    document_id: document.id,
                    storage_locator: document.storage_locator.clone(),
                    file_exists: true,
                    is_valid: actual == document.content_hash,
                    expected_hash: document.content_hash,
                    actual_hash: Some(actual),
                })
            }
            None => Ok(IntegrityReport {
                document_id: document.id,
                storage_locator: document.storage_locator.clone(),
                file_exists: false,
                is_valid: false,
                expected_hash: document.content_hash,
                actual_hash: None,
            }),
        }
    }

    /// Soft-delete a document. The row and the bytes stay: fiscal history
    /// must remain reconstructable.
    ///
    /// Refuses when the document is already deleted, and when it is the
    /// stamped XML of a receipt whose stamp is still active - the same
    /// legal constraint the ledger enforces on the receipt itself.
    pub async fn delete(
        &self,
        id: &DocumentId,
        actor: &UserId,
        reason: &str,
    ) -> Result<FiscalDocument> {
        let document = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("document {}", id)))?;

        if document.is_deleted() {
            return Err(VaultError::BadRequest(format!(
                "document {} is already deleted",
                id
            )));
        }

        if document.kind == DocumentKind::StampedXml {
            let owner = self
                .store
                .get_receipt(&document.owner_receipt_id)
                .await?
                .ok_or_else(|| {
                    VaultError::NotFound(format!("receipt {}", document.owner_receipt_id))
                })?;
            if owner.is_fiscally_sealed() {
                return Err(VaultError::BadRequest(format!(
                    "document {} is the stamped XML of receipt {}, which carries an \
                     active stamp: cancel the stamp before deleting",
                    id, owner.id
                )));
            }
        }

        let now = Utc::now();
        let audit = AuditRecord::new(
            AuditAction::DocumentDeleted,
            id.as_uuid(),
            *actor,
            json!({
                "kind": document.kind.as_str(),
                "version": document.version,
                "hash_prefix": document.content_hash.short(),
                "reason": reason,
            }),
            now,
        );

        let deleted = self
            .store
            .soft_delete_document(id, actor, reason, &audit)
            .await?;

        tracing::info!(document = %id, reason, "fiscal document soft-deleted");
        Ok(deleted)
    }
}
