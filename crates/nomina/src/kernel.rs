//! The payroll kernel: unified API over ledger, vault, gate, and readiness.
//!
//! One shared store backs all four services, so cross-cutting rules (the
//! fiscal seal above all) are enforced consistently no matter which door a
//! caller comes through.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use nomina_core::{
    AuditAction, AuditRecord, AuthorizeCapability, DocumentId, DocumentKind, EmployeeId,
    FiscalDocument, PayFigures, PayPeriod, PeriodId, PeriodStatus, Receipt, ReceiptId,
    SnapshotReason, StampingAuthorization, StampingCredentials, User, UserId, VersionDiff,
};
use nomina_gate::StampingGate;
use nomina_ledger::{ModifyCheck, StampOutcome, VersionLedger};
use nomina_store::{BlobStore, Store};
use nomina_vault::{
    DocumentVault, GetOptions, IntegrityReport, PeriodIntegrityReport, RetrievedDocument,
    StoreOptions,
};

use crate::error::{KernelError, Result};
use crate::readiness::{ReadinessAggregator, StampReadiness};

/// Configuration for the kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Whether to structurally validate figures when creating receipts.
    pub validate_figures: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            validate_figures: true,
        }
    }
}

/// The main kernel struct.
///
/// Provides a unified API for:
/// - Creating receipts and recalculating them with full version history
/// - Storing and verifying fiscal documents
/// - Authorizing and revoking stamping for periods
/// - Aggregated readiness checks before the external stamping call
pub struct PayrollKernel<S, B> {
    store: Arc<S>,
    ledger: VersionLedger<S>,
    vault: DocumentVault<S, B>,
    gate: StampingGate<S>,
    readiness: ReadinessAggregator<S>,
    config: KernelConfig,
}

impl<S: Store, B: BlobStore> PayrollKernel<S, B> {
    /// Create a new kernel instance over a store and a blob store.
    pub fn new(store: S, blobs: B, config: KernelConfig) -> Self {
        let store = Arc::new(store);
        let blobs = Arc::new(blobs);
        Self {
            ledger: VersionLedger::new(Arc::clone(&store)),
            vault: DocumentVault::new(Arc::clone(&store), blobs),
            gate: StampingGate::new(Arc::clone(&store)),
            readiness: ReadinessAggregator::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setup Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn register_period(&self, period: &PayPeriod) -> Result<()> {
        Ok(self.store.upsert_period(period).await?)
    }

    pub async fn set_period_status(
        &self,
        period_id: &PeriodId,
        status: PeriodStatus,
    ) -> Result<PayPeriod> {
        let mut period = self
            .store
            .get_period(period_id)
            .await?
            .ok_or_else(|| KernelError::NotFound(format!("period {}", period_id)))?;
        period.status = status;
        self.store.upsert_period(&period).await?;
        Ok(period)
    }

    pub async fn register_user(&self, user: &User) -> Result<()> {
        Ok(self.store.upsert_user(user).await?)
    }

    pub async fn register_credentials(&self, credentials: &StampingCredentials) -> Result<()> {
        Ok(self.store.upsert_credentials(credentials).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Receipt Operations (Version Ledger)
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the version-1 receipt for a (period, employee) pair from
    /// calculation-engine figures.
    pub async fn create_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
        figures: &PayFigures,
        actor_id: &UserId,
    ) -> Result<Receipt> {
        if self.config.validate_figures {
            figures.validate()?;
        }

        let now = Utc::now();
        let receipt = Receipt::initial(*period_id, *employee_id, figures, now);
        self.store.insert_receipt(&receipt).await?;

        self.store
            .append_audit(
                &AuditRecord::new(
                    AuditAction::ReceiptCreated,
                    receipt.id.as_uuid(),
                    *actor_id,
                    json!({
                        "employee_id": employee_id.to_string(),
                        "net_pay": receipt.net_pay.to_string(),
                    }),
                    now,
                )
                .with_period(*period_id),
            )
            .await?;

        tracing::info!(receipt = %receipt.id, period = %period_id, "receipt created");
        Ok(receipt)
    }

    /// Advisory mutability check. See [`VersionLedger::can_modify`].
    pub async fn can_modify(&self, receipt_id: &ReceiptId) -> Result<ModifyCheck> {
        Ok(self.ledger.can_modify(receipt_id).await?)
    }

    /// Recalculate: supersede the receipt and chain its successor.
    pub async fn recalculate(
        &self,
        receipt_id: &ReceiptId,
        figures: &PayFigures,
        actor_id: &UserId,
        reason: SnapshotReason,
    ) -> Result<Receipt> {
        Ok(self
            .ledger
            .recalculate(receipt_id, figures, actor_id, reason)
            .await?)
    }

    pub async fn get_receipt(&self, receipt_id: &ReceiptId) -> Result<Option<Receipt>> {
        Ok(self.store.get_receipt(receipt_id).await?)
    }

    pub async fn get_active_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
    ) -> Result<Option<Receipt>> {
        Ok(self.ledger.get_active_receipt(period_id, employee_id).await?)
    }

    pub async fn get_version_chain(&self, receipt_id: &ReceiptId) -> Result<Vec<Receipt>> {
        Ok(self.ledger.get_version_chain(receipt_id).await?)
    }

    pub async fn compare_versions(
        &self,
        receipt_id: &ReceiptId,
        version_a: u32,
        version_b: u32,
    ) -> Result<VersionDiff> {
        Ok(self
            .ledger
            .compare_versions(receipt_id, version_a, version_b)
            .await?)
    }

    /// Record an outcome reported by the external stamping authority.
    pub async fn record_stamp_outcome(
        &self,
        receipt_id: &ReceiptId,
        outcome: StampOutcome,
        actor_id: &UserId,
    ) -> Result<Receipt> {
        Ok(self
            .ledger
            .record_stamp_outcome(receipt_id, outcome, actor_id)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations (Integrity Store)
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn store_document(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
        bytes: &[u8],
        options: StoreOptions,
    ) -> Result<FiscalDocument> {
        Ok(self.vault.store(owner, kind, bytes, options).await?)
    }

    pub async fn get_document(
        &self,
        id: &DocumentId,
        options: GetOptions,
    ) -> Result<RetrievedDocument> {
        Ok(self.vault.get(id, options).await?)
    }

    pub async fn verify_document_integrity(&self, id: &DocumentId) -> Result<IntegrityReport> {
        Ok(self.vault.verify_integrity(id).await?)
    }

    pub async fn verify_period_integrity(
        &self,
        period_id: &PeriodId,
    ) -> Result<PeriodIntegrityReport> {
        Ok(self.vault.verify_period_integrity(period_id).await?)
    }

    pub async fn delete_document(
        &self,
        id: &DocumentId,
        actor_id: &UserId,
        reason: &str,
    ) -> Result<FiscalDocument> {
        Ok(self.vault.delete(id, actor_id, reason).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stamping Gate Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn authorize_stamping(
        &self,
        period_id: &PeriodId,
        actor_id: &UserId,
        details: Option<String>,
    ) -> Result<StampingAuthorization> {
        Ok(self.gate.authorize(period_id, actor_id, details).await?)
    }

    pub async fn revoke_stamping(
        &self,
        period_id: &PeriodId,
        actor_id: &UserId,
        reason: &str,
    ) -> Result<StampingAuthorization> {
        Ok(self.gate.revoke(period_id, actor_id, reason).await?)
    }

    pub async fn can_user_authorize(
        &self,
        user_id: &UserId,
        period_id: &PeriodId,
    ) -> Result<AuthorizeCapability> {
        Ok(self.gate.can_user_authorize(user_id, period_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readiness
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the full readiness battery immediately before the external
    /// stamping call.
    pub async fn can_stamp(&self, period_id: &PeriodId) -> Result<StampReadiness> {
        self.readiness.can_stamp(period_id).await
    }
}
