//! Version snapshots and line-item diffs.
//!
//! A snapshot is an immutable historical copy of a receipt, written exactly
//! once at the moment the receipt is about to be superseded (or explicitly
//! checkpointed). Snapshots are never updated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;
use crate::figures::PayConcept;
use crate::receipt::{Receipt, StampStatus};
use crate::types::{ReceiptId, SnapshotId, UserId};

/// Why a snapshot was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotReason {
    /// First capture of a lineage.
    Initial,
    /// Captured because the receipt is being superseded by a recalculation.
    Recalculation,
    /// Captured for a manual correction.
    Correction,
    /// Captured for an adjustment checkpoint.
    Adjustment,
}

impl SnapshotReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotReason::Initial => "initial",
            SnapshotReason::Recalculation => "recalculation",
            SnapshotReason::Correction => "correction",
            SnapshotReason::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "initial" => Ok(SnapshotReason::Initial),
            "recalculation" => Ok(SnapshotReason::Recalculation),
            "correction" => Ok(SnapshotReason::Correction),
            "adjustment" => Ok(SnapshotReason::Adjustment),
            other => Err(CoreError::UnknownSnapshotReason(other.to_string())),
        }
    }
}

impl fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable historical copy of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub id: SnapshotId,
    /// The receipt row this snapshot copies.
    pub receipt_id: ReceiptId,
    pub version: u32,

    pub worked_days: Decimal,
    pub total_perceptions: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,

    /// Ordered copies of the line items at capture time.
    pub perceptions: Vec<PayConcept>,
    pub deductions: Vec<PayConcept>,

    pub reason: SnapshotReason,
    pub created_by: UserId,
    pub stamp_state_at_capture: StampStatus,
    pub created_at: DateTime<Utc>,
}

impl VersionSnapshot {
    /// Capture a snapshot of the receipt as it stands.
    pub fn capture(
        receipt: &Receipt,
        reason: SnapshotReason,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            receipt_id: receipt.id,
            version: receipt.version,
            worked_days: receipt.worked_days,
            total_perceptions: receipt.total_perceptions,
            total_deductions: receipt.total_deductions,
            net_pay: receipt.net_pay,
            perceptions: receipt.perceptions(),
            deductions: receipt.deductions(),
            reason,
            created_by,
            stamp_state_at_capture: receipt.stamp_status(),
            created_at: now,
        }
    }
}

/// One changed line between two versions, keyed by concept code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineChange {
    Added {
        code: String,
        name: String,
        amount: Decimal,
    },
    Removed {
        code: String,
        name: String,
        amount: Decimal,
    },
    Changed {
        code: String,
        from: Decimal,
        to: Decimal,
        delta: Decimal,
    },
}

impl LineChange {
    pub fn code(&self) -> &str {
        match self {
            LineChange::Added { code, .. }
            | LineChange::Removed { code, .. }
            | LineChange::Changed { code, .. } => code,
        }
    }
}

/// Result of comparing two snapshots of the same lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub version_a: u32,
    pub version_b: u32,
    pub perceptions: Vec<LineChange>,
    pub deductions: Vec<LineChange>,
    /// `b.net_pay - a.net_pay`.
    pub net_pay_delta: Decimal,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.perceptions.is_empty() && self.deductions.is_empty()
    }
}

/// Diff two snapshots line-by-line, keyed by concept code.
///
/// Lineage membership is the caller's responsibility; this is pure
/// computation over the two line sets.
pub fn compare_snapshots(a: &VersionSnapshot, b: &VersionSnapshot) -> VersionDiff {
    VersionDiff {
        version_a: a.version,
        version_b: b.version,
        perceptions: diff_side(&a.perceptions, &b.perceptions),
        deductions: diff_side(&a.deductions, &b.deductions),
        net_pay_delta: b.net_pay - a.net_pay,
    }
}

fn diff_side(side_a: &[PayConcept], side_b: &[PayConcept]) -> Vec<LineChange> {
    let by_code_a: BTreeMap<&str, &PayConcept> =
        side_a.iter().map(|c| (c.code.as_str(), c)).collect();
    let by_code_b: BTreeMap<&str, &PayConcept> =
        side_b.iter().map(|c| (c.code.as_str(), c)).collect();

    let mut changes = Vec::new();

    for (code, concept_b) in &by_code_b {
        match by_code_a.get(code) {
            None => changes.push(LineChange::Added {
                code: concept_b.code.clone(),
                name: concept_b.name.clone(),
                amount: concept_b.amount,
            }),
            Some(concept_a) if concept_a.amount != concept_b.amount => {
                changes.push(LineChange::Changed {
                    code: concept_b.code.clone(),
                    from: concept_a.amount,
                    to: concept_b.amount,
                    delta: concept_b.amount - concept_a.amount,
                })
            }
            Some(_) => {}
        }
    }

    for (code, concept_a) in &by_code_a {
        if !by_code_b.contains_key(code) {
            changes.push(LineChange::Removed {
                code: concept_a.code.clone(),
                name: concept_a.name.clone(),
                amount: concept_a.amount,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figures::{PayConcept, PayFigures};
    use crate::types::{EmployeeId, PeriodId};

    fn snapshot_with(perceptions: Vec<PayConcept>, deductions: Vec<PayConcept>) -> VersionSnapshot {
        let figures = PayFigures::new(Decimal::from(15), perceptions, deductions);
        let receipt = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures, Utc::now());
        VersionSnapshot::capture(
            &receipt,
            SnapshotReason::Recalculation,
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn test_reason_roundtrip() {
        for reason in [
            SnapshotReason::Initial,
            SnapshotReason::Recalculation,
            SnapshotReason::Correction,
            SnapshotReason::Adjustment,
        ] {
            assert_eq!(SnapshotReason::parse(reason.as_str()).unwrap(), reason);
        }
    }

    #[test]
    fn test_capture_copies_figures() {
        let snap = snapshot_with(
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        );
        assert_eq!(snap.version, 1);
        assert_eq!(snap.net_pay, Decimal::from(8_800));
        assert_eq!(snap.perceptions.len(), 1);
        assert_eq!(snap.stamp_state_at_capture, StampStatus::Unstamped);
    }

    #[test]
    fn test_diff_added_line() {
        // Scenario: v1 [Salary 10000], v2 [Salary 10000, Bonus 1500].
        let v1 = snapshot_with(
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
            vec![],
        );
        let mut v2 = snapshot_with(
            vec![
                PayConcept::new("P001", "Sueldo", Decimal::from(10_000)),
                PayConcept::new("P002", "Bono", Decimal::from(1_500)),
            ],
            vec![],
        );
        v2.version = 2;

        let diff = compare_snapshots(&v1, &v2);
        assert_eq!(diff.perceptions.len(), 1);
        assert!(matches!(
            &diff.perceptions[0],
            LineChange::Added { code, amount, .. }
                if code == "P002" && *amount == Decimal::from(1_500)
        ));
        assert!(diff.deductions.is_empty());
        assert_eq!(diff.net_pay_delta, Decimal::from(1_500));
    }

    #[test]
    fn test_diff_removed_and_changed() {
        let v1 = snapshot_with(
            vec![
                PayConcept::new("P001", "Sueldo", Decimal::from(10_000)),
                PayConcept::new("P002", "Bono", Decimal::from(500)),
            ],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_000))],
        );
        let mut v2 = snapshot_with(
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(11_000))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_000))],
        );
        v2.version = 2;

        let diff = compare_snapshots(&v1, &v2);
        assert_eq!(diff.perceptions.len(), 2);
        assert!(diff.perceptions.iter().any(|c| matches!(
            c,
            LineChange::Changed { code, delta, .. }
                if code == "P001" && *delta == Decimal::from(1_000)
        )));
        assert!(diff
            .perceptions
            .iter()
            .any(|c| matches!(c, LineChange::Removed { code, .. } if code == "P002")));
        assert!(diff.deductions.is_empty());
        assert_eq!(diff.net_pay_delta, Decimal::from(500));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let v1 = snapshot_with(
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        );
        let diff = compare_snapshots(&v1, &v1.clone());
        assert!(diff.is_empty());
        assert_eq!(diff.net_pay_delta, Decimal::ZERO);
    }
}
