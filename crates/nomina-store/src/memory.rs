//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use nomina_core::{
    AuditRecord, AuthorizationId, CompanyId, DocumentId, DocumentKind, EmployeeId, FiscalDocument,
    PayPeriod, PeriodId, Receipt, ReceiptId, ReceiptStatus, Stamp, StampingAuthorization,
    StampingCredentials, User, UserId, VersionSnapshot,
};

use crate::error::{Result, StoreError};
use crate::traits::{NewDocument, Store, SupersedeRequest};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock;
/// a write lock gives every mutating method the same atomicity the SQLite
/// backend gets from a transaction.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Receipts indexed by id.
    receipts: HashMap<ReceiptId, Receipt>,

    /// Active index: (period, employee) -> receipt id.
    active: HashMap<(PeriodId, EmployeeId), ReceiptId>,

    /// Snapshots keyed by (receipt, version).
    snapshots: HashMap<(ReceiptId, u32), VersionSnapshot>,

    documents: HashMap<DocumentId, FiscalDocument>,
    authorizations: HashMap<AuthorizationId, StampingAuthorization>,
    periods: HashMap<PeriodId, PayPeriod>,
    users: HashMap<UserId, User>,
    credentials: HashMap<CompanyId, StampingCredentials>,
    audit: Vec<AuditRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn max_document_version(&self, owner: &ReceiptId, kind: DocumentKind) -> u32 {
        self.documents
            .values()
            .filter(|d| d.owner_receipt_id == *owner && d.kind == kind)
            .map(|d| d.version)
            .max()
            .unwrap_or(0)
    }

    fn active_authorization(&self, period_id: &PeriodId) -> Option<&StampingAuthorization> {
        self.authorizations
            .values()
            .find(|a| a.period_id == *period_id && a.is_active)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_receipt(&self, receipt: &Receipt) -> Result<()> {
        let mut inner = self.write()?;
        let key = (receipt.period_id, receipt.employee_id);

        if receipt.active && inner.active.contains_key(&key) {
            return Err(StoreError::Conflict(
                "an active receipt already exists for this (period, employee) pair".into(),
            ));
        }

        if receipt.active {
            inner.active.insert(key, receipt.id);
        }
        inner.receipts.insert(receipt.id, receipt.clone());
        Ok(())
    }

    async fn get_receipt(&self, id: &ReceiptId) -> Result<Option<Receipt>> {
        Ok(self.read()?.receipts.get(id).cloned())
    }

    async fn get_active_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
    ) -> Result<Option<Receipt>> {
        let inner = self.read()?;
        Ok(inner
            .active
            .get(&(*period_id, *employee_id))
            .and_then(|id| inner.receipts.get(id))
            .cloned())
    }

    async fn list_receipts_for_period(&self, period_id: &PeriodId) -> Result<Vec<Receipt>> {
        let inner = self.read()?;
        let mut receipts: Vec<Receipt> = inner
            .receipts
            .values()
            .filter(|r| r.period_id == *period_id)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| (r.employee_id, r.version));
        Ok(receipts)
    }

    async fn supersede_receipt(&self, request: SupersedeRequest) -> Result<Receipt> {
        let mut inner = self.write()?;

        let current = inner
            .receipts
            .get(&request.current_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", request.current_id)))?;

        if current.is_fiscally_sealed() {
            return Err(StoreError::Immutable(
                "receipt is fiscally immutable: cancel the stamp first".into(),
            ));
        }
        if !current.active || current.status == ReceiptStatus::Superseded {
            return Err(StoreError::Immutable(
                "receipt has been superseded: use the current active version".into(),
            ));
        }
        if !current.status.is_recalculable() {
            return Err(StoreError::Immutable(format!(
                "receipt status {} does not allow recalculation",
                current.status
            )));
        }
        if request.successor.version != current.version + 1
            || request.successor.parent_id != Some(current.id)
        {
            return Err(StoreError::Conflict(format!(
                "stale supersession: receipt {} is at version {}",
                current.id, current.version
            )));
        }
        if request.snapshot.receipt_id != current.id {
            return Err(StoreError::InvalidData(
                "snapshot does not reference the superseded receipt".into(),
            ));
        }

        inner
            .snapshots
            .insert((current.id, current.version), request.snapshot);

        let superseded = Receipt {
            active: false,
            status: ReceiptStatus::Superseded,
            superseded_at: Some(request.superseded_at),
            updated_at: request.superseded_at,
            ..current.clone()
        };
        inner.receipts.insert(current.id, superseded);

        let key = (current.period_id, current.employee_id);
        inner.active.insert(key, request.successor.id);
        inner
            .receipts
            .insert(request.successor.id, request.successor.clone());

        inner.audit.push(request.audit);
        Ok(request.successor)
    }

    async fn apply_stamp(
        &self,
        id: &ReceiptId,
        stamp: Option<&Stamp>,
        status: ReceiptStatus,
        audit: &AuditRecord,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let receipt = inner
            .receipts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {}", id)))?;

        if let Some(stamp) = stamp {
            receipt.stamp = Some(*stamp);
        }
        receipt.status = status;
        receipt.updated_at = audit.created_at;

        inner.audit.push(audit.clone());
        Ok(())
    }

    async fn insert_snapshot(
        &self,
        snapshot: &VersionSnapshot,
        audit: &AuditRecord,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let key = (snapshot.receipt_id, snapshot.version);
        if inner.snapshots.contains_key(&key) {
            return Err(StoreError::Conflict(
                "snapshot already captured for this version".into(),
            ));
        }
        inner.snapshots.insert(key, snapshot.clone());
        inner.audit.push(audit.clone());
        Ok(())
    }

    async fn get_snapshot(
        &self,
        receipt_id: &ReceiptId,
        version: u32,
    ) -> Result<Option<VersionSnapshot>> {
        Ok(self.read()?.snapshots.get(&(*receipt_id, version)).cloned())
    }

    async fn list_snapshots_for_receipt(
        &self,
        receipt_id: &ReceiptId,
    ) -> Result<Vec<VersionSnapshot>> {
        let inner = self.read()?;
        let mut snapshots: Vec<VersionSnapshot> = inner
            .snapshots
            .values()
            .filter(|s| s.receipt_id == *receipt_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }

    async fn next_document_version(&self, owner: &ReceiptId, kind: DocumentKind) -> Result<u32> {
        Ok(self.read()?.max_document_version(owner, kind) + 1)
    }

    async fn insert_document_version(
        &self,
        document: NewDocument,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument> {
        let mut inner = self.write()?;

        let expected = inner.max_document_version(&document.owner_receipt_id, document.kind) + 1;
        if document.version != expected {
            return Err(StoreError::Conflict(format!(
                "document version {} is stale: next version is {}",
                document.version, expected
            )));
        }

        if !document.allow_duplicate {
            let duplicate = inner.documents.values().any(|d| {
                d.owner_receipt_id == document.owner_receipt_id
                    && d.kind == document.kind
                    && d.is_active
                    && d.content_hash == document.content_hash
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "identical content ({}) already stored for this receipt and kind",
                    document.content_hash.short()
                )));
            }
        }

        for existing in inner.documents.values_mut() {
            if existing.owner_receipt_id == document.owner_receipt_id
                && existing.kind == document.kind
                && existing.is_active
            {
                existing.is_active = false;
            }
        }

        let stored = FiscalDocument {
            id: document.id,
            owner_receipt_id: document.owner_receipt_id,
            kind: document.kind,
            version: document.version,
            content_hash: document.content_hash,
            storage_locator: document.storage_locator,
            byte_size: document.byte_size,
            file_name: document.file_name,
            mime_type: document.mime_type,
            is_active: true,
            deleted_at: None,
            deleted_by: None,
            delete_reason: None,
            created_at: document.created_at,
            created_by: document.created_by,
        };
        inner.documents.insert(stored.id, stored.clone());
        inner.audit.push(audit.clone());
        Ok(stored)
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<FiscalDocument>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn get_active_document(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
    ) -> Result<Option<FiscalDocument>> {
        let inner = self.read()?;
        Ok(inner
            .documents
            .values()
            .find(|d| d.owner_receipt_id == *owner && d.kind == kind && d.is_active)
            .cloned())
    }

    async fn list_documents_for_owner(&self, owner: &ReceiptId) -> Result<Vec<FiscalDocument>> {
        let inner = self.read()?;
        let mut documents: Vec<FiscalDocument> = inner
            .documents
            .values()
            .filter(|d| d.owner_receipt_id == *owner)
            .cloned()
            .collect();
        documents.sort_by_key(|d| (d.kind.as_str(), d.version));
        Ok(documents)
    }

    async fn list_active_documents_for_period(
        &self,
        period_id: &PeriodId,
    ) -> Result<Vec<FiscalDocument>> {
        let inner = self.read()?;
        let mut documents: Vec<FiscalDocument> = inner
            .documents
            .values()
            .filter(|d| {
                d.is_active
                    && inner
                        .receipts
                        .get(&d.owner_receipt_id)
                        .is_some_and(|r| r.period_id == *period_id)
            })
            .cloned()
            .collect();
        documents.sort_by_key(|d| (d.owner_receipt_id, d.kind.as_str()));
        Ok(documents)
    }

    async fn soft_delete_document(
        &self,
        id: &DocumentId,
        actor: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument> {
        let mut inner = self.write()?;
        let now = audit.created_at;

        let document = inner
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;

        if document.is_deleted() {
            return Err(StoreError::Conflict(format!(
                "document {} is already deleted",
                id
            )));
        }

        document.is_active = false;
        document.deleted_at = Some(now);
        document.deleted_by = Some(*actor);
        document.delete_reason = Some(reason.to_string());
        let deleted = document.clone();

        inner.audit.push(audit.clone());
        Ok(deleted)
    }

    async fn insert_authorization(
        &self,
        authorization: &StampingAuthorization,
        audit: &AuditRecord,
    ) -> Result<()> {
        let mut inner = self.write()?;

        if inner.active_authorization(&authorization.period_id).is_some() {
            return Err(StoreError::Conflict(
                "period already has an active stamping authorization".into(),
            ));
        }

        if let Some(period) = inner.periods.get_mut(&authorization.period_id) {
            period.authorized_for_stamping = true;
            period.authorized_at = Some(authorization.authorized_at);
            period.authorized_by = Some(authorization.authorized_by);
        }

        inner
            .authorizations
            .insert(authorization.id, authorization.clone());
        inner.audit.push(audit.clone());
        Ok(())
    }

    async fn get_active_authorization(
        &self,
        period_id: &PeriodId,
    ) -> Result<Option<StampingAuthorization>> {
        Ok(self.read()?.active_authorization(period_id).cloned())
    }

    async fn list_authorizations(
        &self,
        period_id: &PeriodId,
    ) -> Result<Vec<StampingAuthorization>> {
        let inner = self.read()?;
        let mut authorizations: Vec<StampingAuthorization> = inner
            .authorizations
            .values()
            .filter(|a| a.period_id == *period_id)
            .cloned()
            .collect();
        authorizations.sort_by_key(|a| a.authorized_at);
        Ok(authorizations)
    }

    async fn deactivate_authorization(
        &self,
        period_id: &PeriodId,
        revoked_by: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<StampingAuthorization> {
        let mut inner = self.write()?;
        let now = audit.created_at;

        let id = inner
            .active_authorization(period_id)
            .map(|a| a.id)
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "no active stamping authorization for period {}",
                    period_id
                ))
            })?;

        let authorization = inner
            .authorizations
            .get_mut(&id)
            .ok_or_else(|| StoreError::InvalidData("authorization disappeared".into()))?;
        authorization.is_active = false;
        authorization.revoked_at = Some(now);
        authorization.revoked_by = Some(*revoked_by);
        authorization.revoke_reason = Some(reason.to_string());
        let revoked = authorization.clone();

        if let Some(period) = inner.periods.get_mut(period_id) {
            period.authorized_for_stamping = false;
            period.authorized_at = None;
            period.authorized_by = None;
        }

        inner.audit.push(audit.clone());
        Ok(revoked)
    }

    async fn upsert_period(&self, period: &PayPeriod) -> Result<()> {
        self.write()?.periods.insert(period.id, period.clone());
        Ok(())
    }

    async fn get_period(&self, id: &PeriodId) -> Result<Option<PayPeriod>> {
        Ok(self.read()?.periods.get(id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.write()?.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn upsert_credentials(&self, credentials: &StampingCredentials) -> Result<()> {
        self.write()?
            .credentials
            .insert(credentials.company_id, credentials.clone());
        Ok(())
    }

    async fn get_credentials(
        &self,
        company_id: &CompanyId,
    ) -> Result<Option<StampingCredentials>> {
        Ok(self.read()?.credentials.get(company_id).cloned())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.write()?.audit.push(record.clone());
        Ok(())
    }

    async fn list_audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditRecord>> {
        let inner = self.read()?;
        Ok(inner
            .audit
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nomina_core::{AuditAction, PayConcept, PayFigures, SnapshotReason};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn figures() -> PayFigures {
        PayFigures::new(
            Decimal::from(15),
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        )
    }

    #[tokio::test]
    async fn test_active_index_maintained() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let v1 = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(), now);
        store.insert_receipt(&v1).await.unwrap();

        let active = store
            .get_active_receipt(&v1.period_id, &v1.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, v1.id);

        // Second active row for the pair is rejected, matching SQLite.
        let dup = Receipt::initial(v1.period_id, v1.employee_id, &figures(), now);
        assert!(matches!(
            store.insert_receipt(&dup).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_supersede_swaps_active() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let actor = UserId::new();
        let v1 = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(), now);
        store.insert_receipt(&v1).await.unwrap();

        let v2 = v1.successor(&figures(), now);
        let request = SupersedeRequest {
            current_id: v1.id,
            snapshot: VersionSnapshot::capture(&v1, SnapshotReason::Recalculation, actor, now),
            successor: v2.clone(),
            superseded_at: now,
            audit: AuditRecord::new(
                AuditAction::ReceiptRecalculated,
                v1.id.as_uuid(),
                actor,
                json!({}),
                now,
            ),
        };
        store.supersede_receipt(request).await.unwrap();

        let old = store.get_receipt(&v1.id).await.unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.status, ReceiptStatus::Superseded);

        let active = store
            .get_active_receipt(&v1.period_id, &v1.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, v2.id);

        // Superseding the old version again fails.
        let stale = SupersedeRequest {
            current_id: v1.id,
            snapshot: VersionSnapshot::capture(&v1, SnapshotReason::Recalculation, actor, now),
            successor: v1.successor(&figures(), now),
            superseded_at: now,
            audit: AuditRecord::new(
                AuditAction::ReceiptRecalculated,
                v1.id.as_uuid(),
                actor,
                json!({}),
                now,
            ),
        };
        assert!(matches!(
            store.supersede_receipt(stale).await,
            Err(StoreError::Immutable(_))
        ));
    }
}
