//! Readiness aggregation: "can this period be stamped right now?"
//!
//! The aggregator runs a fixed battery of independent checks and collects
//! every failure as a structured issue instead of stopping at the first -
//! the operator needs the complete list to fix all problems in one pass.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use nomina_core::{PeriodId, ReceiptStatus, StampStatus};
use nomina_store::Store;

use crate::error::{KernelError, Result};

/// Identifies one failed readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCode {
    NotAuthorized,
    PacNotConfigured,
    CertificateExpired,
    CertificateExpiringSoon,
    InvalidPeriodStatus,
    NoReceipts,
}

/// How serious an issue is. Stamping proceeds only when no issue is
/// critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
}

/// One failed readiness check, with the remedy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    pub resolution: String,
}

/// Receipt counts by stamping state, for operator visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptTally {
    pub total: usize,
    pub stamped: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Summary of the stamping-authority configuration consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacSummary {
    pub configured: bool,
    pub provider: Option<String>,
    pub certificate_expires_at: Option<DateTime<Utc>>,
}

/// Aggregate readiness verdict for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampReadiness {
    /// True iff no issue has critical severity.
    pub can_stamp: bool,
    pub issues: Vec<Issue>,
    pub receipts: ReceiptTally,
    pub pac: PacSummary,
}

/// Certificates within this window raise a warning rather than a blocker.
const CERTIFICATE_WARNING_DAYS: i64 = 30;

/// The readiness aggregator service.
pub struct ReadinessAggregator<S> {
    store: Arc<S>,
}

impl<S: Store> ReadinessAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Run the full readiness battery for a period.
    ///
    /// Never stops at the first failure; every failing check becomes an
    /// [`Issue`].
    pub async fn can_stamp(&self, period_id: &PeriodId) -> Result<StampReadiness> {
        let period = self
            .store
            .get_period(period_id)
            .await?
            .ok_or_else(|| KernelError::NotFound(format!("period {}", period_id)))?;

        let mut issues = Vec::new();
        let now = Utc::now();

        // Authorization present.
        let authorization = self.store.get_active_authorization(period_id).await?;
        if authorization.is_none() || !period.authorized_for_stamping {
            issues.push(Issue {
                code: IssueCode::NotAuthorized,
                severity: Severity::Critical,
                message: format!("period {} is not authorized for stamping", period_id),
                resolution: "have a payroll manager authorize the period".into(),
            });
        }

        // Stamping-authority credentials configured and certificate valid.
        let credentials = self.store.get_credentials(&period.company_id).await?;
        let pac = match &credentials {
            Some(c) => PacSummary {
                configured: c.is_configured(),
                provider: Some(c.pac_provider.clone()),
                certificate_expires_at: c.certificate_expires_at,
            },
            None => PacSummary {
                configured: false,
                provider: None,
                certificate_expires_at: None,
            },
        };

        match &credentials {
            None => issues.push(Issue {
                code: IssueCode::PacNotConfigured,
                severity: Severity::Critical,
                message: format!(
                    "no stamping-authority credentials for company {}",
                    period.company_id
                ),
                resolution: "register PAC credentials for the company".into(),
            }),
            Some(c) if !c.is_configured() => issues.push(Issue {
                code: IssueCode::PacNotConfigured,
                severity: Severity::Critical,
                message: "stamping-authority credentials are incomplete".into(),
                resolution: "provide the PAC provider, RFC, certificate, and private key".into(),
            }),
            Some(c) => {
                if c.certificate_expired(now) {
                    issues.push(Issue {
                        code: IssueCode::CertificateExpired,
                        severity: Severity::Critical,
                        message: "the signing certificate has expired".into(),
                        resolution: "renew the CSD certificate before stamping".into(),
                    });
                } else if let Some(expires) = c.certificate_expires_at {
                    if expires <= now + Duration::days(CERTIFICATE_WARNING_DAYS) {
                        issues.push(Issue {
                            code: IssueCode::CertificateExpiringSoon,
                            severity: Severity::Warning,
                            message: format!("the signing certificate expires on {}", expires),
                            resolution: "schedule a CSD certificate renewal".into(),
                        });
                    }
                }
            }
        }

        // Period status valid for stamping.
        if !period.status.is_authorizable() {
            issues.push(Issue {
                code: IssueCode::InvalidPeriodStatus,
                severity: Severity::Critical,
                message: format!(
                    "period {} has status {}; stamping requires calculated or approved",
                    period_id, period.status
                ),
                resolution: "finish calculating and approving the period".into(),
            });
        }

        // Tally receipts by stamped / pending / failed.
        let receipts = self.store.list_receipts_for_period(period_id).await?;
        let mut tally = ReceiptTally::default();
        for receipt in receipts.iter().filter(|r| r.active) {
            tally.total += 1;
            if receipt.stamp_status() == StampStatus::Stamped {
                tally.stamped += 1;
            } else if receipt.status == ReceiptStatus::StampError {
                tally.failed += 1;
            } else {
                tally.pending += 1;
            }
        }

        if tally.total == 0 {
            issues.push(Issue {
                code: IssueCode::NoReceipts,
                severity: Severity::Warning,
                message: format!("period {} has no active receipts", period_id),
                resolution: "run the payroll calculation for the period".into(),
            });
        }

        let can_stamp = !issues.iter().any(|i| i.severity == Severity::Critical);

        Ok(StampReadiness {
            can_stamp,
            issues,
            receipts: tally,
            pac,
        })
    }
}
