//! The version ledger: append-only receipt history and the immutability gate.
//!
//! Financial history is append-only. A recalculation never overwrites a
//! figure; it snapshots the current version, deactivates it, and inserts a
//! successor row chained via `parent_id`. Once a receipt is fiscally
//! stamped, no code path may mutate it until the stamp is cancelled by the
//! external authority.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use nomina_core::{
    compare_snapshots, AuditAction, AuditRecord, EmployeeId, PayFigures, PeriodId, Receipt,
    ReceiptId, ReceiptStatus, SnapshotReason, Stamp, StampStatus, UserId, VersionDiff,
    VersionSnapshot,
};
use nomina_store::{Store, SupersedeRequest};

use crate::error::{LedgerError, Result};

/// Outcome reported by the external stamping authority. Treated as an
/// opaque fact that gates mutability; the ledger never produces stamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampOutcome {
    /// The authority issued a stamp. The receipt becomes fiscally sealed.
    Stamped { fiscal_uuid: Uuid },
    /// The authority rejected the receipt; it stays mutable.
    Failed { detail: String },
    /// A previously issued stamp was cancelled. The receipt becomes
    /// recalculable again.
    Cancelled { fiscal_uuid: Uuid },
}

/// Answer to "may this receipt be modified right now".
///
/// This is an advisory read with no locking; the authoritative check runs
/// inside the supersession transaction. See [`VersionLedger::recalculate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCheck {
    pub can_modify: bool,
    /// Human-readable reason when modification is denied.
    pub reason: Option<String>,
    pub current_status: ReceiptStatus,
    pub has_stamp: bool,
}

/// The version ledger service.
pub struct VersionLedger<S> {
    store: Arc<S>,
}

impl<S: Store> VersionLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Check whether a receipt may currently be modified.
    ///
    /// Pure read, no side effects. Two concurrent callers can both see
    /// `can_modify = true`; the mutating transaction re-checks and
    /// serializes them.
    pub async fn can_modify(&self, receipt_id: &ReceiptId) -> Result<ModifyCheck> {
        let receipt = self
            .store
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt_id)))?;

        let has_stamp = receipt.stamp.is_some();

        if receipt.is_fiscally_sealed() {
            return Ok(ModifyCheck {
                can_modify: false,
                reason: Some("fiscally immutable: the receipt carries an active stamp".into()),
                current_status: receipt.status,
                has_stamp,
            });
        }

        if receipt.status.is_immutable() {
            return Ok(ModifyCheck {
                can_modify: false,
                reason: Some(format!("immutable status: {}", receipt.status)),
                current_status: receipt.status,
                has_stamp,
            });
        }

        Ok(ModifyCheck {
            can_modify: true,
            reason: None,
            current_status: receipt.status,
            has_stamp,
        })
    }

    /// Recalculate a receipt: supersede the current version and create its
    /// successor inside one transaction.
    ///
    /// Preconditions, checked in order, each with a distinct failure:
    /// 1. the receipt exists;
    /// 2. it is not fiscally stamped;
    /// 3. it is the active version;
    /// 4. its status allows recalculation;
    /// 5. the new figures are structurally valid.
    ///
    /// No mutation happens until all checks pass, and the store re-verifies
    /// 2-4 inside the transaction.
    pub async fn recalculate(
        &self,
        receipt_id: &ReceiptId,
        figures: &PayFigures,
        actor_id: &UserId,
        reason: SnapshotReason,
    ) -> Result<Receipt> {
        let current = self
            .store
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt_id)))?;

        if current.is_fiscally_sealed() {
            return Err(LedgerError::PermissionDenied(format!(
                "receipt {} is fiscally immutable: cancel the stamp first",
                current.id
            )));
        }

        if current.status == ReceiptStatus::Superseded || !current.active {
            return Err(LedgerError::PermissionDenied(format!(
                "receipt {} was superseded: use the current active version",
                current.id
            )));
        }

        if !current.status.is_recalculable() {
            let allowed: Vec<&str> = ReceiptStatus::RECALCULABLE
                .iter()
                .map(|s| s.as_str())
                .collect();
            return Err(LedgerError::PermissionDenied(format!(
                "receipt {} has status {}; recalculation is allowed from: {}",
                current.id,
                current.status,
                allowed.join(", ")
            )));
        }

        figures.validate()?;

        let now = Utc::now();
        let successor = current.successor(figures, now);
        let snapshot = VersionSnapshot::capture(&current, reason, *actor_id, now);

        let audit = AuditRecord::new(
            AuditAction::ReceiptRecalculated,
            current.id.as_uuid(),
            *actor_id,
            json!({
                "reason": reason.as_str(),
                "superseded_version": current.version,
                "new_version": successor.version,
                "new_receipt_id": successor.id.to_string(),
                "net_pay_before": current.net_pay.to_string(),
                "net_pay_after": successor.net_pay.to_string(),
            }),
            now,
        )
        .with_period(current.period_id);

        let persisted = self
            .store
            .supersede_receipt(SupersedeRequest {
                current_id: current.id,
                snapshot,
                successor,
                superseded_at: now,
                audit,
            })
            .await?;

        tracing::info!(
            receipt = %current.id,
            new_receipt = %persisted.id,
            version = persisted.version,
            net_pay_before = %current.net_pay,
            net_pay_after = %persisted.net_pay,
            "receipt recalculated"
        );

        Ok(persisted)
    }

    /// The unique active receipt for a (period, employee) pair.
    pub async fn get_active_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
    ) -> Result<Option<Receipt>> {
        Ok(self.store.get_active_receipt(period_id, employee_id).await?)
    }

    /// Walk `parent_id` pointers from the given receipt back to the
    /// version-1 ancestor, returning the chain oldest first.
    ///
    /// The walk asserts strictly decreasing versions, so a damaged chain
    /// (cycle, cross-linked lineage) terminates with `CorruptChain` instead
    /// of looping.
    pub async fn get_version_chain(&self, receipt_id: &ReceiptId) -> Result<Vec<Receipt>> {
        let start = self
            .store
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt_id)))?;

        let mut chain = vec![start];

        loop {
            let cursor = chain.last().expect("chain is non-empty");
            let Some(parent_id) = cursor.parent_id else {
                break;
            };

            let parent = self.store.get_receipt(&parent_id).await?.ok_or_else(|| {
                LedgerError::CorruptChain(format!(
                    "receipt {} references missing parent {}",
                    cursor.id, parent_id
                ))
            })?;

            if parent.version >= cursor.version {
                return Err(LedgerError::CorruptChain(format!(
                    "parent {} has version {} >= child version {}",
                    parent.id, parent.version, cursor.version
                )));
            }

            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Diff two versions of the same lineage by concept code.
    ///
    /// Both versions must be ancestors of (or equal to) the given receipt.
    /// The active head has no stored snapshot until superseded; it is
    /// compared via an in-memory capture that is never persisted.
    pub async fn compare_versions(
        &self,
        receipt_id: &ReceiptId,
        version_a: u32,
        version_b: u32,
    ) -> Result<VersionDiff> {
        let chain = self.get_version_chain(receipt_id).await?;

        let snapshot_a = self.snapshot_for(&chain, version_a).await?;
        let snapshot_b = self.snapshot_for(&chain, version_b).await?;

        Ok(compare_snapshots(&snapshot_a, &snapshot_b))
    }

    async fn snapshot_for(&self, chain: &[Receipt], version: u32) -> Result<VersionSnapshot> {
        let receipt = chain.iter().find(|r| r.version == version).ok_or_else(|| {
            LedgerError::NotFound(format!(
                "version {} is not part of this lineage (versions 1..={})",
                version,
                chain.last().map(|r| r.version).unwrap_or(0)
            ))
        })?;

        if let Some(snapshot) = self.store.get_snapshot(&receipt.id, version).await? {
            return Ok(snapshot);
        }

        // The live head: capture in memory, do not persist.
        Ok(VersionSnapshot::capture(
            receipt,
            SnapshotReason::Adjustment,
            UserId::NIL,
            Utc::now(),
        ))
    }

    /// Capture an explicit checkpoint snapshot of a receipt as it stands.
    pub async fn checkpoint(
        &self,
        receipt_id: &ReceiptId,
        reason: SnapshotReason,
        actor_id: &UserId,
    ) -> Result<VersionSnapshot> {
        let receipt = self
            .store
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt_id)))?;

        let now = Utc::now();
        let snapshot = VersionSnapshot::capture(&receipt, reason, *actor_id, now);
        let audit = AuditRecord::new(
            AuditAction::SnapshotCheckpointed,
            receipt.id.as_uuid(),
            *actor_id,
            json!({"version": receipt.version, "reason": reason.as_str()}),
            now,
        )
        .with_period(receipt.period_id);

        self.store.insert_snapshot(&snapshot, &audit).await?;
        Ok(snapshot)
    }

    /// Record a stamping-authority outcome against a receipt.
    ///
    /// Metadata transition only: financial figures never change here.
    pub async fn record_stamp_outcome(
        &self,
        receipt_id: &ReceiptId,
        outcome: StampOutcome,
        actor_id: &UserId,
    ) -> Result<Receipt> {
        let receipt = self
            .store
            .get_receipt(receipt_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt_id)))?;

        let now = Utc::now();
        let (stamp, status, detail) = match &outcome {
            StampOutcome::Stamped { fiscal_uuid } => {
                if receipt.is_fiscally_sealed() {
                    return Err(LedgerError::Conflict(format!(
                        "receipt {} already carries an active stamp",
                        receipt.id
                    )));
                }
                (
                    Some(Stamp::stamped(*fiscal_uuid, now)),
                    ReceiptStatus::StampOk,
                    json!({"outcome": "stamped", "fiscal_uuid": fiscal_uuid.to_string()}),
                )
            }
            StampOutcome::Failed { detail } => {
                if receipt.is_fiscally_sealed() {
                    return Err(LedgerError::Conflict(format!(
                        "receipt {} already carries an active stamp",
                        receipt.id
                    )));
                }
                (
                    None,
                    ReceiptStatus::StampError,
                    json!({"outcome": "failed", "detail": detail}),
                )
            }
            StampOutcome::Cancelled { fiscal_uuid } => {
                if receipt.stamp_status() != StampStatus::Stamped {
                    return Err(LedgerError::Conflict(format!(
                        "receipt {} has no active stamp to cancel",
                        receipt.id
                    )));
                }
                // After external cancellation the receipt returns to
                // Calculated so corrections can proceed.
                (
                    Some(Stamp::cancelled(*fiscal_uuid, now)),
                    ReceiptStatus::Calculated,
                    json!({"outcome": "cancelled", "fiscal_uuid": fiscal_uuid.to_string()}),
                )
            }
        };

        let audit = AuditRecord::new(
            AuditAction::StampApplied,
            receipt.id.as_uuid(),
            *actor_id,
            detail,
            now,
        )
        .with_period(receipt.period_id);

        self.store
            .apply_stamp(&receipt.id, stamp.as_ref(), status, &audit)
            .await?;

        tracing::info!(receipt = %receipt.id, ?outcome, "stamp outcome recorded");

        self.store
            .get_receipt(&receipt.id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {}", receipt.id)))
    }
}
