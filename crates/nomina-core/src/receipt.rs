//! Receipt: one computed payroll result for a (period, employee) pair.
//!
//! A receipt's financial figures are immutable once persisted. A new value
//! always means a new receipt row chained to its predecessor via `parent_id`;
//! the predecessor is kept, deactivated, and marked superseded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::figures::{LineKind, PayConcept, PayFigures};
use crate::types::{EmployeeId, PeriodId, ReceiptId};

/// Lifecycle status of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Created, figures not yet confirmed.
    Pending,
    /// Figures computed and persisted.
    Calculated,
    /// Reviewed and approved for stamping.
    Approved,
    /// Sent to the stamping authority, awaiting outcome.
    Stamping,
    /// Stamped successfully; fiscally sealed.
    StampOk,
    /// The stamping authority rejected the receipt.
    StampError,
    /// Paid out to the employee.
    Paid,
    /// Cancelled before payment.
    Cancelled,
    /// Replaced by a newer version; kept for history.
    Superseded,
}

impl ReceiptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Calculated => "calculated",
            ReceiptStatus::Approved => "approved",
            ReceiptStatus::Stamping => "stamping",
            ReceiptStatus::StampOk => "stamp_ok",
            ReceiptStatus::StampError => "stamp_error",
            ReceiptStatus::Paid => "paid",
            ReceiptStatus::Cancelled => "cancelled",
            ReceiptStatus::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(ReceiptStatus::Pending),
            "calculated" => Ok(ReceiptStatus::Calculated),
            "approved" => Ok(ReceiptStatus::Approved),
            "stamping" => Ok(ReceiptStatus::Stamping),
            "stamp_ok" => Ok(ReceiptStatus::StampOk),
            "stamp_error" => Ok(ReceiptStatus::StampError),
            "paid" => Ok(ReceiptStatus::Paid),
            "cancelled" => Ok(ReceiptStatus::Cancelled),
            "superseded" => Ok(ReceiptStatus::Superseded),
            other => Err(CoreError::UnknownReceiptStatus(other.to_string())),
        }
    }

    /// Statuses from which a recalculation may start.
    pub const RECALCULABLE: [ReceiptStatus; 3] = [
        ReceiptStatus::Pending,
        ReceiptStatus::Calculated,
        ReceiptStatus::StampError,
    ];

    /// Whether a recalculation may start from this status.
    pub fn is_recalculable(self) -> bool {
        Self::RECALCULABLE.contains(&self)
    }

    /// Statuses that freeze the receipt regardless of stamp state.
    pub fn is_immutable(self) -> bool {
        matches!(
            self,
            ReceiptStatus::StampOk
                | ReceiptStatus::Paid
                | ReceiptStatus::Cancelled
                | ReceiptStatus::Superseded
        )
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stamp state reported by the external stamping authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StampStatus {
    Unstamped,
    Stamped,
    Cancelled,
}

impl StampStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StampStatus::Unstamped => "unstamped",
            StampStatus::Stamped => "stamped",
            StampStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "unstamped" => Ok(StampStatus::Unstamped),
            "stamped" => Ok(StampStatus::Stamped),
            "cancelled" => Ok(StampStatus::Cancelled),
            other => Err(CoreError::UnknownStampStatus(other.to_string())),
        }
    }
}

impl fmt::Display for StampStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fiscal stamp attached to a receipt by the external authority.
///
/// Treated as an opaque fact: the ledger never produces stamps, it only
/// records them and lets them gate mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Fiscal UUID assigned by the authority.
    pub uuid: Uuid,
    pub status: StampStatus,
    pub stamped_at: DateTime<Utc>,
}

impl Stamp {
    /// A successful stamp.
    pub fn stamped(uuid: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            uuid,
            status: StampStatus::Stamped,
            stamped_at: at,
        }
    }

    /// A cancelled stamp (external cancellation completed).
    pub fn cancelled(uuid: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            uuid,
            status: StampStatus::Cancelled,
            stamped_at: at,
        }
    }

    pub fn is_stamped(&self) -> bool {
        self.status == StampStatus::Stamped
    }
}

/// One ordered line on a receipt, tagged with its payslip side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub kind: LineKind,
    pub concept: PayConcept,
}

/// One computed payroll result for one (pay-period, employee) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub period_id: PeriodId,
    pub employee_id: EmployeeId,

    /// Version within the lineage, starting at 1.
    pub version: u32,
    /// The receipt this one supersedes (None for version 1).
    pub parent_id: Option<ReceiptId>,
    /// Exactly one receipt per (period, employee) is active at any time.
    pub active: bool,
    pub superseded_at: Option<DateTime<Utc>>,

    pub status: ReceiptStatus,

    // Financial snapshot. Immutable once persisted: a new value means a
    // new receipt row.
    pub worked_days: Decimal,
    pub total_perceptions: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,

    /// Ordered line items, perceptions first.
    pub lines: Vec<ReceiptLine>,

    /// Present once the stamping authority has reported an outcome.
    pub stamp: Option<Stamp>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// Create a version-1 receipt from calculation-engine figures.
    pub fn initial(
        period_id: PeriodId,
        employee_id: EmployeeId,
        figures: &PayFigures,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReceiptId::new(),
            period_id,
            employee_id,
            version: 1,
            parent_id: None,
            active: true,
            superseded_at: None,
            status: ReceiptStatus::Pending,
            worked_days: figures.worked_days,
            total_perceptions: figures.total_perceptions(),
            total_deductions: figures.total_deductions(),
            net_pay: figures.net_pay(),
            lines: lines_from(figures),
            stamp: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the successor receipt that supersedes this one.
    ///
    /// The successor starts at `Calculated` with fresh line items; the
    /// caller is responsible for persisting both sides atomically.
    pub fn successor(&self, figures: &PayFigures, now: DateTime<Utc>) -> Self {
        Self {
            id: ReceiptId::new(),
            period_id: self.period_id,
            employee_id: self.employee_id,
            version: self.version + 1,
            parent_id: Some(self.id),
            active: true,
            superseded_at: None,
            status: ReceiptStatus::Calculated,
            worked_days: figures.worked_days,
            total_perceptions: figures.total_perceptions(),
            total_deductions: figures.total_deductions(),
            net_pay: figures.net_pay(),
            lines: lines_from(figures),
            stamp: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current stamp state, `Unstamped` when no stamp has been recorded.
    pub fn stamp_status(&self) -> StampStatus {
        self.stamp.map_or(StampStatus::Unstamped, |s| s.status)
    }

    /// A stamped receipt is permanently read-only until the stamp is
    /// cancelled by the external authority.
    pub fn is_fiscally_sealed(&self) -> bool {
        self.stamp_status() == StampStatus::Stamped
    }

    /// Perception lines in order.
    pub fn perceptions(&self) -> Vec<PayConcept> {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Perception)
            .map(|l| l.concept.clone())
            .collect()
    }

    /// Deduction lines in order.
    pub fn deductions(&self) -> Vec<PayConcept> {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Deduction)
            .map(|l| l.concept.clone())
            .collect()
    }
}

fn lines_from(figures: &PayFigures) -> Vec<ReceiptLine> {
    figures
        .perceptions
        .iter()
        .map(|c| ReceiptLine {
            kind: LineKind::Perception,
            concept: c.clone(),
        })
        .chain(figures.deductions.iter().map(|c| ReceiptLine {
            kind: LineKind::Deduction,
            concept: c.clone(),
        }))
        .collect()
}
