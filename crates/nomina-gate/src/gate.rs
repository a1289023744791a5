//! The stamping gate: a period-level one-way switch.
//!
//! Stamping turns receipts into legally frozen documents, so the act of
//! sending a period to the stamping authority must be explicitly authorized
//! first. Authorization is revocable only until the first receipt is
//! stamped; after that the permission cannot be retracted.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use nomina_core::{
    AuditAction, AuditRecord, AuthorizeCapability, PeriodId, Receipt, ReceiptStatus,
    StampingAuthorization, UserId,
};
use nomina_store::Store;

use crate::error::{GateError, Result};

/// Receipt statuses that may still be pending when stamping is authorized.
const AUTHORIZABLE_RECEIPT_STATUSES: [ReceiptStatus; 2] =
    [ReceiptStatus::Calculated, ReceiptStatus::Pending];

/// The stamping gate service.
pub struct StampingGate<S> {
    store: Arc<S>,
}

impl<S: Store> StampingGate<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Authorize a period for stamping.
    ///
    /// Preconditions:
    /// - the period exists and is in a Calculated or Approved status;
    /// - no active authorization exists (Conflict);
    /// - every active receipt is Calculated or Pending (PermissionDenied,
    ///   reporting the straggler count);
    /// - no receipt is already stamped (Conflict: re-authorizing a
    ///   partially stamped period is meaningless).
    ///
    /// The authorization insert, the period-flag update, and the audit
    /// record commit in one transaction.
    pub async fn authorize(
        &self,
        period_id: &PeriodId,
        actor_id: &UserId,
        details: Option<String>,
    ) -> Result<StampingAuthorization> {
        let period = self
            .store
            .get_period(period_id)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("period {}", period_id)))?;

        if !period.status.is_authorizable() {
            return Err(GateError::PermissionDenied(format!(
                "period {} has status {}; stamping can be authorized from: calculated, approved",
                period_id, period.status
            )));
        }

        if self.store.get_active_authorization(period_id).await?.is_some() {
            return Err(GateError::Conflict(format!(
                "period {} already has an active stamping authorization",
                period_id
            )));
        }

        let receipts = self.store.list_receipts_for_period(period_id).await?;
        let active: Vec<&Receipt> = receipts.iter().filter(|r| r.active).collect();

        let stragglers = active
            .iter()
            .filter(|r| !AUTHORIZABLE_RECEIPT_STATUSES.contains(&r.status))
            .count();
        if stragglers > 0 {
            return Err(GateError::PermissionDenied(format!(
                "{} of {} receipts in period {} are not ready for stamping \
                 (required status: calculated or pending)",
                stragglers,
                active.len(),
                period_id
            )));
        }

        if receipts.iter().any(|r| r.is_fiscally_sealed()) {
            return Err(GateError::Conflict(format!(
                "period {} already contains stamped receipts; re-authorization is meaningless",
                period_id
            )));
        }

        let now = Utc::now();
        let total_net_pay: Decimal = active.iter().map(|r| r.net_pay).sum();
        let authorization = StampingAuthorization::new(*period_id, *actor_id, details, now);

        let audit = AuditRecord::new(
            AuditAction::StampingAuthorized,
            authorization.id.as_uuid(),
            *actor_id,
            json!({
                "receipt_count": active.len(),
                "total_net_pay": total_net_pay.to_string(),
            }),
            now,
        )
        .with_period(*period_id);

        self.store.insert_authorization(&authorization, &audit).await?;

        tracing::info!(
            period = %period_id,
            receipts = active.len(),
            total_net_pay = %total_net_pay,
            "period authorized for stamping"
        );

        Ok(authorization)
    }

    /// Revoke a period's active authorization.
    ///
    /// Forbidden once any receipt in the period is stamped: permission
    /// cannot be retracted after the irreversible act has begun. The
    /// authorization record is deactivated, not deleted.
    pub async fn revoke(
        &self,
        period_id: &PeriodId,
        actor_id: &UserId,
        reason: &str,
    ) -> Result<StampingAuthorization> {
        let receipts = self.store.list_receipts_for_period(period_id).await?;
        let stamped = receipts.iter().filter(|r| r.is_fiscally_sealed()).count();
        if stamped > 0 {
            return Err(GateError::PermissionDenied(format!(
                "{} receipts in period {} are already stamped; the authorization can no \
                 longer be revoked",
                stamped, period_id
            )));
        }

        let now = Utc::now();
        let audit = AuditRecord::new(
            AuditAction::StampingRevoked,
            period_id.as_uuid(),
            *actor_id,
            json!({"reason": reason}),
            now,
        )
        .with_period(*period_id);

        let revoked = self
            .store
            .deactivate_authorization(period_id, actor_id, reason, &audit)
            .await?;

        tracing::info!(period = %period_id, reason, "stamping authorization revoked");
        Ok(revoked)
    }

    /// Capability check: may this user authorize stamping for this period?
    ///
    /// Returns the structured reasons, not just a verdict, so callers can
    /// render why authorization was denied.
    pub async fn can_user_authorize(
        &self,
        user_id: &UserId,
        period_id: &PeriodId,
    ) -> Result<AuthorizeCapability> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("user {}", user_id)))?;
        let period = self
            .store
            .get_period(period_id)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("period {}", period_id)))?;

        Ok(AuthorizeCapability::evaluate(&user, period.company_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nomina_core::{
        CompanyId, EmployeeId, PayConcept, PayFigures, PayPeriod, PeriodStatus, Role, Stamp, User,
    };
    use nomina_store::MemoryStore;
    use uuid::Uuid;

    struct Fixture {
        gate: StampingGate<MemoryStore>,
        store: Arc<MemoryStore>,
        period: PayPeriod,
        actor: UserId,
    }

    async fn fixture(status: PeriodStatus) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gate = StampingGate::new(Arc::clone(&store));

        let mut period = PayPeriod::new(
            CompanyId::new(),
            "2026-02 primera quincena",
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
        );
        period.status = status;
        store.upsert_period(&period).await.unwrap();

        Fixture {
            gate,
            store,
            period,
            actor: UserId::new(),
        }
    }

    fn figures(salary: i64) -> PayFigures {
        PayFigures::new(
            rust_decimal::Decimal::from(15),
            vec![PayConcept::new(
                "P001",
                "Sueldo",
                rust_decimal::Decimal::from(salary),
            )],
            vec![],
        )
    }

    async fn add_receipt(f: &Fixture, status: ReceiptStatus) -> Receipt {
        let mut receipt =
            Receipt::initial(f.period.id, EmployeeId::new(), &figures(10_000), Utc::now());
        receipt.status = status;
        f.store.insert_receipt(&receipt).await.unwrap();
        receipt
    }

    async fn seal(f: &Fixture, receipt: &Receipt) {
        let stamp = Stamp::stamped(Uuid::new_v4(), Utc::now());
        let audit = AuditRecord::new(
            AuditAction::StampApplied,
            receipt.id.as_uuid(),
            f.actor,
            json!({}),
            Utc::now(),
        );
        f.store
            .apply_stamp(&receipt.id, Some(&stamp), ReceiptStatus::StampOk, &audit)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_authorize_happy_path() {
        let f = fixture(PeriodStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::Pending).await;

        let auth = f
            .gate
            .authorize(&f.period.id, &f.actor, Some("quincena lista".into()))
            .await
            .unwrap();
        assert!(auth.is_active);

        let period = f.store.get_period(&f.period.id).await.unwrap().unwrap();
        assert!(period.authorized_for_stamping);
        assert_eq!(period.authorized_by, Some(f.actor));
    }

    #[tokio::test]
    async fn test_authorize_requires_period_status() {
        let f = fixture(PeriodStatus::Open).await;
        let err = f
            .gate
            .authorize(&f.period.id, &f.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_reauthorize_conflicts() {
        let f = fixture(PeriodStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::Calculated).await;

        f.gate.authorize(&f.period.id, &f.actor, None).await.unwrap();
        let err = f
            .gate
            .authorize(&f.period.id, &f.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_straggler_receipts_block_authorization() {
        let f = fixture(PeriodStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::StampError).await;

        let err = f
            .gate
            .authorize(&f.period.id, &f.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied(_)));
        assert!(err.to_string().contains("1 of 2"));
    }

    #[tokio::test]
    async fn test_partially_stamped_period_conflicts() {
        let f = fixture(PeriodStatus::Calculated).await;
        let receipt = add_receipt(&f, ReceiptStatus::Calculated).await;
        seal(&f, &receipt).await;

        let err = f
            .gate
            .authorize(&f.period.id, &f.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_revoke_keeps_history() {
        let f = fixture(PeriodStatus::Calculated).await;
        add_receipt(&f, ReceiptStatus::Calculated).await;

        f.gate.authorize(&f.period.id, &f.actor, None).await.unwrap();
        let revoked = f
            .gate
            .revoke(&f.period.id, &f.actor, "figures changed")
            .await
            .unwrap();
        assert!(!revoked.is_active);
        assert_eq!(revoked.revoke_reason.as_deref(), Some("figures changed"));

        let period = f.store.get_period(&f.period.id).await.unwrap().unwrap();
        assert!(!period.authorized_for_stamping);

        // History is retained and the period can be authorized again.
        assert_eq!(
            f.store.list_authorizations(&f.period.id).await.unwrap().len(),
            1
        );
        f.gate.authorize(&f.period.id, &f.actor, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_without_authorization_is_not_found() {
        let f = fixture(PeriodStatus::Calculated).await;
        let err = f
            .gate
            .revoke(&f.period.id, &f.actor, "nothing to revoke")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_revoke_after_stamping_denied() {
        let f = fixture(PeriodStatus::Calculated).await;
        let receipt = add_receipt(&f, ReceiptStatus::Calculated).await;

        f.gate.authorize(&f.period.id, &f.actor, None).await.unwrap();
        seal(&f, &receipt).await;

        let err = f
            .gate
            .revoke(&f.period.id, &f.actor, "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied(_)));

        // The authorization stays active.
        assert!(f
            .store
            .get_active_authorization(&f.period.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_can_user_authorize() {
        let f = fixture(PeriodStatus::Calculated).await;

        let manager = User {
            id: UserId::new(),
            company_id: f.period.company_id,
            name: "Ana".into(),
            role: Role::PayrollManager,
        };
        let outsider = User {
            id: UserId::new(),
            company_id: CompanyId::new(),
            name: "Luis".into(),
            role: Role::Admin,
        };
        let viewer = User {
            id: UserId::new(),
            company_id: f.period.company_id,
            name: "Sofia".into(),
            role: Role::Viewer,
        };
        for user in [&manager, &outsider, &viewer] {
            f.store.upsert_user(user).await.unwrap();
        }

        let cap = f
            .gate
            .can_user_authorize(&manager.id, &f.period.id)
            .await
            .unwrap();
        assert!(cap.allowed);

        let cap = f
            .gate
            .can_user_authorize(&outsider.id, &f.period.id)
            .await
            .unwrap();
        assert!(!cap.allowed);
        assert!(!cap.same_company);
        assert!(cap.has_permission);

        let cap = f
            .gate
            .can_user_authorize(&viewer.id, &f.period.id)
            .await
            .unwrap();
        assert!(!cap.allowed);
        assert!(!cap.has_permission);
        assert!(!cap.reasons.is_empty());

        // Unknown user is NotFound, not a capability result.
        let err = f
            .gate
            .can_user_authorize(&UserId::new(), &f.period.id)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::NotFound(_)));
    }
}
