//! Pay periods and stamping-authority credentials.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{CompanyId, PeriodId, UserId};

/// Lifecycle status of a pay period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodStatus {
    /// Accepting payroll input.
    Open,
    /// All receipts computed.
    Calculated,
    /// Reviewed and approved.
    Approved,
    /// Stamping in progress.
    Stamping,
    /// Closed; no further activity.
    Closed,
}

impl PeriodStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Calculated => "calculated",
            PeriodStatus::Approved => "approved",
            PeriodStatus::Stamping => "stamping",
            PeriodStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "open" => Ok(PeriodStatus::Open),
            "calculated" => Ok(PeriodStatus::Calculated),
            "approved" => Ok(PeriodStatus::Approved),
            "stamping" => Ok(PeriodStatus::Stamping),
            "closed" => Ok(PeriodStatus::Closed),
            other => Err(CoreError::UnknownPeriodStatus(other.to_string())),
        }
    }

    /// Whether stamping may be authorized from this status.
    pub fn is_authorizable(self) -> bool {
        matches!(self, PeriodStatus::Calculated | PeriodStatus::Approved)
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pay period of one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub id: PeriodId,
    pub company_id: CompanyId,
    pub name: String,
    pub status: PeriodStatus,

    /// Mirror of the active authorization, kept on the period row so that
    /// readiness checks need a single read.
    pub authorized_for_stamping: bool,
    pub authorized_at: Option<DateTime<Utc>>,
    pub authorized_by: Option<UserId>,

    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl PayPeriod {
    pub fn new(
        company_id: CompanyId,
        name: impl Into<String>,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Self {
        Self {
            id: PeriodId::new(),
            company_id,
            name: name.into(),
            status: PeriodStatus::Open,
            authorized_for_stamping: false,
            authorized_at: None,
            authorized_by: None,
            starts_on,
            ends_on,
        }
    }
}

/// Stamping-authority (PAC) configuration for a company.
///
/// Consumed by readiness checks; the actual PAC client is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampingCredentials {
    pub company_id: CompanyId,
    pub pac_provider: String,
    /// Taxpayer registry code of the employer.
    pub rfc: String,
    pub has_certificate: bool,
    pub has_private_key: bool,
    pub certificate_expires_at: Option<DateTime<Utc>>,
}

impl StampingCredentials {
    /// All pieces present to attempt stamping.
    pub fn is_configured(&self) -> bool {
        !self.pac_provider.is_empty()
            && !self.rfc.is_empty()
            && self.has_certificate
            && self.has_private_key
    }

    /// Whether the signing certificate has expired as of `now`.
    pub fn certificate_expired(&self, now: DateTime<Utc>) -> bool {
        self.certificate_expires_at
            .map(|expires| expires <= now)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            PeriodStatus::Open,
            PeriodStatus::Calculated,
            PeriodStatus::Approved,
            PeriodStatus::Stamping,
            PeriodStatus::Closed,
        ] {
            assert_eq!(PeriodStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_authorizable_statuses() {
        assert!(PeriodStatus::Calculated.is_authorizable());
        assert!(PeriodStatus::Approved.is_authorizable());
        assert!(!PeriodStatus::Open.is_authorizable());
        assert!(!PeriodStatus::Closed.is_authorizable());
    }

    #[test]
    fn test_new_period_defaults() {
        let period = PayPeriod::new(
            CompanyId::new(),
            "2026-Q1 primera quincena",
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        );
        assert_eq!(period.status, PeriodStatus::Open);
        assert!(!period.authorized_for_stamping);
    }

    fn credentials(expires: Option<DateTime<Utc>>) -> StampingCredentials {
        StampingCredentials {
            company_id: CompanyId::new(),
            pac_provider: "pac-demo".into(),
            rfc: "AAA010101AAA".into(),
            has_certificate: true,
            has_private_key: true,
            certificate_expires_at: expires,
        }
    }

    #[test]
    fn test_credentials_configured() {
        assert!(credentials(None).is_configured());

        let mut missing_key = credentials(None);
        missing_key.has_private_key = false;
        assert!(!missing_key.is_configured());

        let mut no_rfc = credentials(None);
        no_rfc.rfc.clear();
        assert!(!no_rfc.is_configured());
    }

    #[test]
    fn test_certificate_expiry() {
        let now = Utc::now();
        assert!(!credentials(None).certificate_expired(now));
        assert!(!credentials(Some(now + Duration::days(30))).certificate_expired(now));
        assert!(credentials(Some(now - Duration::days(1))).certificate_expired(now));
    }
}
