//! Store trait: the abstract interface for ledger persistence.
//!
//! This trait allows the services to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).
//!
//! # Design Notes
//!
//! - **Transactional mutations**: every multi-row mutation (supersession,
//!   document versioning, authorization) commits atomically with its audit
//!   record, or not at all.
//! - **Re-checked preconditions**: the mutating methods re-verify record
//!   state inside the transaction. The advisory `can_modify`-style reads in
//!   the services are not authoritative; these checks are.
//! - **Storage-enforced invariants**: "one active receipt per
//!   (period, employee)" and "one active authorization per period" are
//!   partial unique indexes, not just application checks, so concurrent
//!   mutations fail loudly instead of forking a lineage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nomina_core::{
    AuditRecord, CompanyId, ContentHash, DocumentId, DocumentKind, EmployeeId, FiscalDocument,
    PayPeriod, PeriodId, Receipt, ReceiptId, ReceiptStatus, Stamp, StampingAuthorization,
    StampingCredentials, User, UserId, VersionSnapshot,
};

use crate::error::Result;

/// Everything the atomic supersession transaction needs, prepared by the
/// ledger service: the snapshot of the outgoing version, the fully built
/// successor, and the audit record describing the change.
#[derive(Debug, Clone)]
pub struct SupersedeRequest {
    /// The receipt being superseded.
    pub current_id: ReceiptId,
    /// Snapshot of the current receipt, written before it is deactivated.
    pub snapshot: VersionSnapshot,
    /// The successor receipt (version n+1, active, with fresh lines).
    pub successor: Receipt,
    pub superseded_at: DateTime<Utc>,
    pub audit: AuditRecord,
}

/// Metadata for a document version about to be inserted. The version and
/// locator are assigned by the vault before the blob write; the store
/// re-verifies the version inside the transaction.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: DocumentId,
    pub owner_receipt_id: ReceiptId,
    pub kind: DocumentKind,
    pub version: u32,
    pub content_hash: ContentHash,
    pub storage_locator: String,
    pub byte_size: u64,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// When false, an active document of the same (owner, kind) with the
    /// same hash rejects the insert.
    pub allow_duplicate: bool,
}

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async; the SQLite backend uses `spawn_blocking`
/// internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Receipt Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new receipt and its line items.
    ///
    /// Fails with `Conflict` if another active receipt exists for the same
    /// (period, employee) pair.
    async fn insert_receipt(&self, receipt: &Receipt) -> Result<()>;

    /// Get a receipt (any version, active or not) by id.
    async fn get_receipt(&self, id: &ReceiptId) -> Result<Option<Receipt>>;

    /// Get the unique active receipt for a (period, employee) pair.
    async fn get_active_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
    ) -> Result<Option<Receipt>>;

    /// All receipts of a period, including superseded history.
    async fn list_receipts_for_period(&self, period_id: &PeriodId) -> Result<Vec<Receipt>>;

    /// Atomically supersede a receipt: snapshot it, deactivate it, insert
    /// its successor with fresh lines, and append the audit record.
    ///
    /// Re-verifies inside the transaction that the current receipt is still
    /// active, unstamped, in a recalculable status, and that the successor
    /// version chains correctly. Returns the successor as persisted.
    async fn supersede_receipt(&self, request: SupersedeRequest) -> Result<Receipt>;

    /// Record an external stamping outcome on a receipt.
    ///
    /// This is a metadata transition: financial columns are untouched.
    /// `stamp` is `None` for a failed attempt (status changes, no stamp
    /// was issued).
    async fn apply_stamp(
        &self,
        id: &ReceiptId,
        stamp: Option<&Stamp>,
        status: ReceiptStatus,
        audit: &AuditRecord,
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an explicit checkpoint snapshot with its audit record.
    async fn insert_snapshot(&self, snapshot: &VersionSnapshot, audit: &AuditRecord)
        -> Result<()>;

    /// Get the snapshot of a specific receipt row at a specific version.
    async fn get_snapshot(
        &self,
        receipt_id: &ReceiptId,
        version: u32,
    ) -> Result<Option<VersionSnapshot>>;

    /// All snapshots captured for a receipt row, oldest first.
    async fn list_snapshots_for_receipt(
        &self,
        receipt_id: &ReceiptId,
    ) -> Result<Vec<VersionSnapshot>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Next version number for (owner, kind): `max(version) + 1`.
    async fn next_document_version(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
    ) -> Result<u32>;

    /// Atomically insert a document version, deactivate the previous active
    /// version of the same (owner, kind), and append the audit record.
    ///
    /// Fails with `Conflict` on a duplicate hash (unless allowed) or when
    /// the assigned version was taken by a concurrent insert.
    async fn insert_document_version(
        &self,
        document: NewDocument,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument>;

    /// Get document metadata by id, soft-deleted rows included.
    async fn get_document(&self, id: &DocumentId) -> Result<Option<FiscalDocument>>;

    /// The active (newest, not deleted) document of a given kind for an owner.
    async fn get_active_document(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
    ) -> Result<Option<FiscalDocument>>;

    /// All document versions for an owner, oldest first.
    async fn list_documents_for_owner(&self, owner: &ReceiptId) -> Result<Vec<FiscalDocument>>;

    /// Active documents of every receipt in a period.
    async fn list_active_documents_for_period(
        &self,
        period_id: &PeriodId,
    ) -> Result<Vec<FiscalDocument>>;

    /// Soft-delete a document: deactivate and record who/when/why.
    ///
    /// Fails with `Conflict` if the document is already deleted.
    async fn soft_delete_document(
        &self,
        id: &DocumentId,
        actor: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument>;

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically insert an authorization, set the period's authorization
    /// flags, and append the audit record.
    ///
    /// Fails with `Conflict` if the period already has an active
    /// authorization (partial unique index).
    async fn insert_authorization(
        &self,
        authorization: &StampingAuthorization,
        audit: &AuditRecord,
    ) -> Result<()>;

    /// The active authorization for a period, if any.
    async fn get_active_authorization(
        &self,
        period_id: &PeriodId,
    ) -> Result<Option<StampingAuthorization>>;

    /// Full authorization history for a period, oldest first.
    async fn list_authorizations(&self, period_id: &PeriodId)
        -> Result<Vec<StampingAuthorization>>;

    /// Atomically deactivate the active authorization, clear the period's
    /// flags, and append the audit record. Returns the deactivated record.
    ///
    /// Fails with `NotFound` when no active authorization exists.
    async fn deactivate_authorization(
        &self,
        period_id: &PeriodId,
        revoked_by: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<StampingAuthorization>;

    // ─────────────────────────────────────────────────────────────────────────
    // Period / User / Credential Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn upsert_period(&self, period: &PayPeriod) -> Result<()>;

    async fn get_period(&self, id: &PeriodId) -> Result<Option<PayPeriod>>;

    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    async fn upsert_credentials(&self, credentials: &StampingCredentials) -> Result<()>;

    async fn get_credentials(&self, company_id: &CompanyId)
        -> Result<Option<StampingCredentials>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a standalone audit record (mutating methods append their own).
    async fn append_audit(&self, record: &AuditRecord) -> Result<()>;

    /// Audit history for one entity, oldest first.
    async fn list_audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditRecord>>;
}
