//! End-to-end scenarios over the full kernel: SQLite store, filesystem
//! blob store, and every service wired together.
//!
//! Each test mirrors a contractual behavior of the system: the stamped
//! wall, append-only versioning, content-addressed documents, and the
//! one-way stamping gate.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use nomina::core::{CompanyId, Role, StampingCredentials, User};
use nomina::store::{FsBlobStore, SqliteStore};
use nomina::{
    DocumentKind, EmployeeId, GetOptions, KernelConfig, KernelError, PayConcept, PayFigures,
    PayPeriod, PayrollKernel, PeriodStatus, ReceiptStatus, SnapshotReason, StampOutcome,
    StampStatus, StoreOptions, UserId,
};

struct TestEnv {
    kernel: PayrollKernel<SqliteStore, FsBlobStore>,
    period: PayPeriod,
    actor: UserId,
    _blob_dir: tempfile::TempDir,
}

async fn env() -> TestEnv {
    let blob_dir = tempfile::tempdir().unwrap();
    let kernel = PayrollKernel::new(
        SqliteStore::open_memory().unwrap(),
        FsBlobStore::new(blob_dir.path()),
        KernelConfig::default(),
    );

    let company = CompanyId::new();
    let mut period = PayPeriod::new(
        company,
        "2026-01 primera quincena",
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
    );
    period.status = PeriodStatus::Calculated;
    kernel.register_period(&period).await.unwrap();

    let actor = UserId::new();
    kernel
        .register_user(&User {
            id: actor,
            company_id: company,
            name: "Ana Torres".into(),
            role: Role::PayrollManager,
        })
        .await
        .unwrap();

    TestEnv {
        kernel,
        period,
        actor,
        _blob_dir: blob_dir,
    }
}

fn base_figures() -> PayFigures {
    PayFigures::new(
        Decimal::from(15),
        vec![PayConcept::new("P001", "Sueldo", Decimal::from(10_000))],
        vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
    )
}

/// Scenario A: recalculate, stamp, then hit the wall.
#[tokio::test]
async fn scenario_a_recalculate_then_stamped_wall() {
    let env = env().await;
    let employee = EmployeeId::new();

    let v1 = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();
    assert_eq!(v1.status, ReceiptStatus::Pending);

    let check = env.kernel.can_modify(&v1.id).await.unwrap();
    assert!(check.can_modify);

    let v2 = env
        .kernel
        .recalculate(
            &v1.id,
            &base_figures(),
            &env.actor,
            SnapshotReason::Recalculation,
        )
        .await
        .unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.parent_id, Some(v1.id));
    assert!(v2.active);
    assert_eq!(v2.status, ReceiptStatus::Calculated);

    let v1_after = env.kernel.get_receipt(&v1.id).await.unwrap().unwrap();
    assert!(!v1_after.active);
    assert_eq!(v1_after.status, ReceiptStatus::Superseded);

    // External stamping seals v2.
    let sealed = env
        .kernel
        .record_stamp_outcome(
            &v2.id,
            StampOutcome::Stamped {
                fiscal_uuid: Uuid::new_v4(),
            },
            &env.actor,
        )
        .await
        .unwrap();
    assert_eq!(sealed.status, ReceiptStatus::StampOk);
    assert_eq!(sealed.stamp_status(), StampStatus::Stamped);

    let err = env
        .kernel
        .recalculate(
            &v2.id,
            &base_figures(),
            &env.actor,
            SnapshotReason::Correction,
        )
        .await
        .unwrap_err();
    match err {
        KernelError::Ledger(inner) => {
            assert!(inner.to_string().contains("fiscally immutable"));
        }
        other => panic!("expected ledger permission denial, got {other:?}"),
    }
}

/// Scenario B: content-addressed document versioning and dedup.
#[tokio::test]
async fn scenario_b_document_dedup_and_versioning() {
    let env = env().await;
    let employee = EmployeeId::new();
    let receipt = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();

    let xml = b"<nomina version=\"1.2\"/>";
    let d1 = env
        .kernel
        .store_document(
            &receipt.id,
            DocumentKind::OriginalXml,
            xml,
            StoreOptions::new(env.actor).file_name("nomina.xml"),
        )
        .await
        .unwrap();
    assert_eq!(d1.version, 1);
    assert_eq!(d1.content_hash.to_hex().len(), 64);

    // Identical bytes without the override: Conflict.
    let err = env
        .kernel
        .store_document(
            &receipt.id,
            DocumentKind::OriginalXml,
            xml,
            StoreOptions::new(env.actor),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::Vault(_)));

    // With the override: version 2, version 1 superseded.
    let d2 = env
        .kernel
        .store_document(
            &receipt.id,
            DocumentKind::OriginalXml,
            xml,
            StoreOptions::new(env.actor).allow_duplicate(true),
        )
        .await
        .unwrap();
    assert_eq!(d2.version, 2);
    assert_eq!(d2.content_hash, d1.content_hash);

    let d1_after = env
        .kernel
        .get_document(&d1.id, GetOptions::default())
        .await
        .unwrap();
    assert!(!d1_after.document.is_active);

    // Hash round-trip: bytes come back verified.
    let d2_read = env
        .kernel
        .get_document(&d2.id, GetOptions::default())
        .await
        .unwrap();
    assert!(d2_read.integrity_valid);
    assert_eq!(d2_read.bytes.as_ref(), xml);

    let report = env
        .kernel
        .verify_period_integrity(&env.period.id)
        .await
        .unwrap();
    assert!(report.all_valid());
    assert_eq!(report.total, 1); // only the active version is scanned
}

/// Scenario C: authorize once, revoke only before stamping begins.
#[tokio::test]
async fn scenario_c_gate_one_way_switch() {
    let env = env().await;
    let employee = EmployeeId::new();
    let receipt = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();
    // Move it past Pending the way the calculation flow would.
    let receipt = env
        .kernel
        .recalculate(
            &receipt.id,
            &base_figures(),
            &env.actor,
            SnapshotReason::Recalculation,
        )
        .await
        .unwrap();

    let capability = env
        .kernel
        .can_user_authorize(&env.actor, &env.period.id)
        .await
        .unwrap();
    assert!(capability.allowed);

    env.kernel
        .authorize_stamping(&env.period.id, &env.actor, Some("quincena lista".into()))
        .await
        .unwrap();

    let err = env
        .kernel
        .authorize_stamping(&env.period.id, &env.actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::Gate(_)));

    // One receipt gets stamped; the gate can no longer be closed.
    env.kernel
        .record_stamp_outcome(
            &receipt.id,
            StampOutcome::Stamped {
                fiscal_uuid: Uuid::new_v4(),
            },
            &env.actor,
        )
        .await
        .unwrap();

    let err = env
        .kernel
        .revoke_stamping(&env.period.id, &env.actor, "cambio de opinion")
        .await
        .unwrap_err();
    match err {
        KernelError::Gate(inner) => assert!(inner.to_string().contains("already stamped")),
        other => panic!("expected gate permission denial, got {other:?}"),
    }
}

/// Scenario D: line-item diff between versions.
#[tokio::test]
async fn scenario_d_compare_versions() {
    let env = env().await;
    let employee = EmployeeId::new();
    let v1 = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();

    let mut with_bonus = base_figures();
    with_bonus
        .perceptions
        .push(PayConcept::new("P002", "Bono", Decimal::from(1_500)));
    let v2 = env
        .kernel
        .recalculate(&v1.id, &with_bonus, &env.actor, SnapshotReason::Recalculation)
        .await
        .unwrap();

    let diff = env.kernel.compare_versions(&v2.id, 1, 2).await.unwrap();
    assert_eq!(diff.net_pay_delta, Decimal::from(1_500));
    assert_eq!(diff.perceptions.len(), 1);
    assert_eq!(diff.perceptions[0].code(), "P002");
    assert!(diff.deductions.is_empty());
}

/// Version-chain integrity across several recalculations.
#[tokio::test]
async fn version_chain_stays_well_formed() {
    let env = env().await;
    let employee = EmployeeId::new();
    let mut head = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();

    for salary in [10_500, 11_000, 11_500] {
        let figures = PayFigures::new(
            Decimal::from(15),
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(salary))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        );
        head = env
            .kernel
            .recalculate(&head.id, &figures, &env.actor, SnapshotReason::Recalculation)
            .await
            .unwrap();
    }

    let chain = env.kernel.get_version_chain(&head.id).await.unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0].parent_id, None);
    for i in 1..chain.len() {
        assert_eq!(chain[i].version, chain[i - 1].version + 1);
        assert_eq!(chain[i].parent_id, Some(chain[i - 1].id));
    }

    // Exactly one active receipt for the pair.
    let active = env
        .kernel
        .get_active_receipt(&env.period.id, &employee)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, head.id);
}

/// Readiness consults the gate, the credentials, and the receipt tally.
#[tokio::test]
async fn readiness_battery_end_to_end() {
    let env = env().await;
    let employee = EmployeeId::new();
    let receipt = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();
    env.kernel
        .recalculate(
            &receipt.id,
            &base_figures(),
            &env.actor,
            SnapshotReason::Recalculation,
        )
        .await
        .unwrap();

    // Missing authorization and credentials: two critical issues at once.
    let readiness = env.kernel.can_stamp(&env.period.id).await.unwrap();
    assert!(!readiness.can_stamp);
    assert!(readiness.issues.len() >= 2);

    env.kernel
        .register_credentials(&StampingCredentials {
            company_id: env.period.company_id,
            pac_provider: "pac-demo".into(),
            rfc: "AAA010101AAA".into(),
            has_certificate: true,
            has_private_key: true,
            certificate_expires_at: Some(Utc::now() + Duration::days(365)),
        })
        .await
        .unwrap();
    env.kernel
        .authorize_stamping(&env.period.id, &env.actor, None)
        .await
        .unwrap();

    let readiness = env.kernel.can_stamp(&env.period.id).await.unwrap();
    assert!(readiness.can_stamp, "issues: {:?}", readiness.issues);
    assert_eq!(readiness.receipts.total, 1);
    assert_eq!(readiness.receipts.pending, 1);
    assert_eq!(readiness.receipts.stamped, 0);
}

/// The stamped XML of a sealed receipt cannot be deleted.
#[tokio::test]
async fn stamped_xml_is_protected() {
    let env = env().await;
    let employee = EmployeeId::new();
    let receipt = env
        .kernel
        .create_receipt(&env.period.id, &employee, &base_figures(), &env.actor)
        .await
        .unwrap();

    let doc = env
        .kernel
        .store_document(
            &receipt.id,
            DocumentKind::StampedXml,
            b"<tfd:TimbreFiscalDigital/>",
            StoreOptions::new(env.actor),
        )
        .await
        .unwrap();

    env.kernel
        .record_stamp_outcome(
            &receipt.id,
            StampOutcome::Stamped {
                fiscal_uuid: Uuid::new_v4(),
            },
            &env.actor,
        )
        .await
        .unwrap();

    let err = env
        .kernel
        .delete_document(&doc.id, &env.actor, "cleanup")
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::Vault(_)));
    assert!(err.to_string().contains("cancel the stamp"));
}
