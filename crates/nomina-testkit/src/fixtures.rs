//! Test fixtures and helpers.
//!
//! Common setup code for integration tests across the workspace.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use nomina_core::{
    CompanyId, EmployeeId, PayConcept, PayFigures, PayPeriod, PeriodStatus, Receipt,
    ReceiptStatus, Role, StampingCredentials, User, UserId,
};
use nomina_gate::StampingGate;
use nomina_ledger::VersionLedger;
use nomina_store::{MemoryBlobStore, MemoryStore, Store};
use nomina_vault::DocumentVault;

/// A test fixture with an in-memory store, blob store, and a seeded actor.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub company: CompanyId,
    pub actor: UserId,
}

impl TestFixture {
    /// Create a fresh fixture.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            company: CompanyId::new(),
            actor: UserId::new(),
        }
    }

    /// A version ledger over the fixture's store.
    pub fn ledger(&self) -> VersionLedger<MemoryStore> {
        VersionLedger::new(Arc::clone(&self.store))
    }

    /// A document vault over the fixture's store and blobs.
    pub fn vault(&self) -> DocumentVault<MemoryStore, MemoryBlobStore> {
        DocumentVault::new(Arc::clone(&self.store), Arc::clone(&self.blobs))
    }

    /// A stamping gate over the fixture's store.
    pub fn gate(&self) -> StampingGate<MemoryStore> {
        StampingGate::new(Arc::clone(&self.store))
    }

    /// Simple salary/ISR figures.
    pub fn figures(salary: i64) -> PayFigures {
        PayFigures::new(
            Decimal::from(15),
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(salary))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        )
    }

    /// Register a period for the fixture's company in the given status.
    pub async fn seed_period(&self, status: PeriodStatus) -> PayPeriod {
        let mut period = PayPeriod::new(
            self.company,
            "2026-01 primera quincena",
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        );
        period.status = status;
        self.store.upsert_period(&period).await.unwrap();
        period
    }

    /// Insert a version-1 receipt for a fresh employee.
    pub async fn seed_receipt(&self, period: &PayPeriod, status: ReceiptStatus) -> Receipt {
        let mut receipt = Receipt::initial(
            period.id,
            EmployeeId::new(),
            &Self::figures(10_000),
            Utc::now(),
        );
        receipt.status = status;
        self.store.insert_receipt(&receipt).await.unwrap();
        receipt
    }

    /// Register a user with the given role in the fixture's company.
    pub async fn seed_user(&self, role: Role) -> User {
        let user = User {
            id: UserId::new(),
            company_id: self.company,
            name: "Test User".into(),
            role,
        };
        self.store.upsert_user(&user).await.unwrap();
        user
    }

    /// Register fully configured stamping credentials.
    pub async fn seed_credentials(&self) -> StampingCredentials {
        let credentials = StampingCredentials {
            company_id: self.company,
            pac_provider: "pac-demo".into(),
            rfc: "AAA010101AAA".into(),
            has_certificate: true,
            has_private_key: true,
            certificate_expires_at: Some(Utc::now() + chrono::Duration::days(365)),
        };
        self.store.upsert_credentials(&credentials).await.unwrap();
        credentials
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
