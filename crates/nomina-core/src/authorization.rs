//! Stamping authorizations, users, and role capabilities.
//!
//! Authorization is a period-scoped one-way switch: it must be explicitly
//! thrown before any receipt in the period may be sent to the stamping
//! authority. Revocations keep the record for history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{AuthorizationId, CompanyId, PeriodId, UserId};

/// A period-scoped permission record. At most one is active per period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampingAuthorization {
    pub id: AuthorizationId,
    pub period_id: PeriodId,
    pub authorized_by: UserId,
    pub authorized_at: DateTime<Utc>,
    /// Optional operator note recorded at authorization time.
    pub details: Option<String>,

    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<UserId>,
    pub revoke_reason: Option<String>,
}

impl StampingAuthorization {
    pub fn new(
        period_id: PeriodId,
        authorized_by: UserId,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuthorizationId::new(),
            period_id,
            authorized_by,
            authorized_at: now,
            details,
            is_active: true,
            revoked_at: None,
            revoked_by: None,
            revoke_reason: None,
        }
    }
}

/// Role of a user within a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    PayrollManager,
    Accountant,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::PayrollManager => "payroll_manager",
            Role::Accountant => "accountant",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "admin" => Ok(Role::Admin),
            "payroll_manager" => Ok(Role::PayrollManager),
            "accountant" => Ok(Role::Accountant),
            "viewer" => Ok(Role::Viewer),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }

    /// Static permission set for the role.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::AuthorizeStamping,
                Permission::RecalculateReceipts,
                Permission::ManageDocuments,
                Permission::ViewPayroll,
            ],
            Role::PayrollManager => &[
                Permission::AuthorizeStamping,
                Permission::RecalculateReceipts,
                Permission::ManageDocuments,
                Permission::ViewPayroll,
            ],
            Role::Accountant => &[Permission::RecalculateReceipts, Permission::ViewPayroll],
            Role::Viewer => &[Permission::ViewPayroll],
        }
    }

    pub fn can(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities gated by role membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    AuthorizeStamping,
    RecalculateReceipts,
    ManageDocuments,
    ViewPayroll,
}

/// A user known to the ledger, for capability checks and audit attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub company_id: CompanyId,
    pub name: String,
    pub role: Role,
}

/// Structured answer to "may this user authorize stamping for this period".
///
/// Carries the individual checks, not just the verdict, so callers can
/// render why authorization was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeCapability {
    pub allowed: bool,
    pub has_permission: bool,
    pub same_company: bool,
    pub reasons: Vec<String>,
}

impl AuthorizeCapability {
    /// Evaluate the capability from its two inputs.
    pub fn evaluate(user: &User, period_company: CompanyId) -> Self {
        let has_permission = user.role.can(Permission::AuthorizeStamping);
        let same_company = user.company_id == period_company;

        let mut reasons = Vec::new();
        if !has_permission {
            reasons.push(format!(
                "role {} lacks the authorize-stamping permission",
                user.role
            ));
        }
        if !same_company {
            reasons.push(format!(
                "user belongs to company {}, period belongs to {}",
                user.company_id, period_company
            ));
        }

        Self {
            allowed: has_permission && same_company,
            has_permission,
            same_company,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, company: CompanyId) -> User {
        User {
            id: UserId::new(),
            company_id: company,
            name: "Test User".into(),
            role,
        }
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [
            Role::Admin,
            Role::PayrollManager,
            Role::Accountant,
            Role::Viewer,
        ] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can(Permission::AuthorizeStamping));
        assert!(Role::PayrollManager.can(Permission::AuthorizeStamping));
        assert!(!Role::Accountant.can(Permission::AuthorizeStamping));
        assert!(!Role::Viewer.can(Permission::RecalculateReceipts));
    }

    #[test]
    fn test_capability_allowed() {
        let company = CompanyId::new();
        let cap = AuthorizeCapability::evaluate(&user(Role::PayrollManager, company), company);
        assert!(cap.allowed);
        assert!(cap.reasons.is_empty());
    }

    #[test]
    fn test_capability_wrong_role() {
        let company = CompanyId::new();
        let cap = AuthorizeCapability::evaluate(&user(Role::Viewer, company), company);
        assert!(!cap.allowed);
        assert!(!cap.has_permission);
        assert!(cap.same_company);
        assert_eq!(cap.reasons.len(), 1);
    }

    #[test]
    fn test_capability_wrong_company() {
        let cap =
            AuthorizeCapability::evaluate(&user(Role::Admin, CompanyId::new()), CompanyId::new());
        assert!(!cap.allowed);
        assert!(cap.has_permission);
        assert!(!cap.same_company);
    }

    #[test]
    fn test_new_authorization_is_active() {
        let auth = StampingAuthorization::new(PeriodId::new(), UserId::new(), None, Utc::now());
        assert!(auth.is_active);
        assert!(auth.revoked_at.is_none());
    }
}
