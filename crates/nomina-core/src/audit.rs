//! Audit records: the side-channel every state change must emit.
//!
//! An audit record is appended in the same transaction as the mutation it
//! describes. The detail payload carries deltas and truncated hash prefixes,
//! never document content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{PeriodId, UserId};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    ReceiptCreated,
    ReceiptRecalculated,
    SnapshotCheckpointed,
    StampApplied,
    DocumentStored,
    DocumentDeleted,
    StampingAuthorized,
    StampingRevoked,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::ReceiptCreated => "receipt_created",
            AuditAction::ReceiptRecalculated => "receipt_recalculated",
            AuditAction::SnapshotCheckpointed => "snapshot_checkpointed",
            AuditAction::StampApplied => "stamp_applied",
            AuditAction::DocumentStored => "document_stored",
            AuditAction::DocumentDeleted => "document_deleted",
            AuditAction::StampingAuthorized => "stamping_authorized",
            AuditAction::StampingRevoked => "stamping_revoked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "receipt_created" => Ok(AuditAction::ReceiptCreated),
            "receipt_recalculated" => Ok(AuditAction::ReceiptRecalculated),
            "snapshot_checkpointed" => Ok(AuditAction::SnapshotCheckpointed),
            "stamp_applied" => Ok(AuditAction::StampApplied),
            "document_stored" => Ok(AuditAction::DocumentStored),
            "document_deleted" => Ok(AuditAction::DocumentDeleted),
            "stamping_authorized" => Ok(AuditAction::StampingAuthorized),
            "stamping_revoked" => Ok(AuditAction::StampingRevoked),
            other => Err(CoreError::UnknownAuditAction(other.to_string())),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: AuditAction,
    /// The entity the action touched (receipt, document, authorization).
    pub entity_id: Uuid,
    pub period_id: Option<PeriodId>,
    pub actor_id: UserId,
    /// Structured detail: before/after figures, reason codes, hash prefixes.
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        entity_id: Uuid,
        actor_id: UserId,
        detail: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            entity_id,
            period_id: None,
            actor_id,
            detail,
            created_at: now,
        }
    }

    pub fn with_period(mut self, period_id: PeriodId) -> Self {
        self.period_id = Some(period_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_roundtrip() {
        for action in [
            AuditAction::ReceiptCreated,
            AuditAction::ReceiptRecalculated,
            AuditAction::SnapshotCheckpointed,
            AuditAction::StampApplied,
            AuditAction::DocumentStored,
            AuditAction::DocumentDeleted,
            AuditAction::StampingAuthorized,
            AuditAction::StampingRevoked,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn test_record_detail() {
        let record = AuditRecord::new(
            AuditAction::ReceiptRecalculated,
            Uuid::new_v4(),
            UserId::new(),
            json!({"net_pay_before": "8800", "net_pay_after": "10300", "reason": "recalculation"}),
            Utc::now(),
        )
        .with_period(PeriodId::new());

        assert_eq!(record.action, AuditAction::ReceiptRecalculated);
        assert!(record.period_id.is_some());
        assert_eq!(record.detail["reason"], "recalculation");
    }
}
