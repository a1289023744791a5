//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Payroll receipts: one row per version, never updated financially.
        CREATE TABLE receipts (
            id TEXT PRIMARY KEY,                  -- UUID
            period_id TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            version INTEGER NOT NULL,             -- 1-indexed within the lineage
            parent_id TEXT,                       -- receipt this one supersedes
            active INTEGER NOT NULL DEFAULT 1,
            superseded_at TEXT,
            status TEXT NOT NULL,
            worked_days TEXT NOT NULL,            -- Decimal as text
            total_perceptions TEXT NOT NULL,
            total_deductions TEXT NOT NULL,
            net_pay TEXT NOT NULL,
            stamp_uuid TEXT,
            stamp_status TEXT,
            stamp_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,

            UNIQUE(period_id, employee_id, version)
        );

        -- Exactly one active receipt per (period, employee). Enforced here,
        -- not only in application code: concurrent recalculations must fail
        -- loudly instead of forking the lineage.
        CREATE UNIQUE INDEX idx_receipts_one_active
            ON receipts(period_id, employee_id) WHERE active = 1;

        CREATE INDEX idx_receipts_period ON receipts(period_id);
        CREATE INDEX idx_receipts_parent ON receipts(parent_id);
        CREATE INDEX idx_receipts_status ON receipts(status);

        -- Ordered line items of a receipt.
        CREATE TABLE receipt_lines (
            receipt_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            kind TEXT NOT NULL,                   -- perception | deduction
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,

            PRIMARY KEY (receipt_id, position)
        );

        -- Immutable historical copies, written at supersession/checkpoint.
        CREATE TABLE version_snapshots (
            id TEXT PRIMARY KEY,
            receipt_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            worked_days TEXT NOT NULL,
            total_perceptions TEXT NOT NULL,
            total_deductions TEXT NOT NULL,
            net_pay TEXT NOT NULL,
            perceptions TEXT NOT NULL,            -- JSON array of concepts
            deductions TEXT NOT NULL,             -- JSON array of concepts
            reason TEXT NOT NULL,
            created_by TEXT NOT NULL,
            stamp_state TEXT NOT NULL,
            created_at TEXT NOT NULL,

            UNIQUE(receipt_id, version)
        );

        -- Content-addressed fiscal artifact metadata.
        CREATE TABLE fiscal_documents (
            id TEXT PRIMARY KEY,
            owner_receipt_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            version INTEGER NOT NULL,             -- monotonic per (owner, kind)
            content_hash TEXT NOT NULL,           -- SHA-256 hex, 64 chars
            storage_locator TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            file_name TEXT,
            mime_type TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            deleted_by TEXT,
            delete_reason TEXT,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,

            UNIQUE(owner_receipt_id, kind, version)
        );

        CREATE INDEX idx_documents_owner ON fiscal_documents(owner_receipt_id, kind);
        CREATE INDEX idx_documents_hash ON fiscal_documents(content_hash);

        -- Period-scoped stamping permissions; history kept on revocation.
        CREATE TABLE stamping_authorizations (
            id TEXT PRIMARY KEY,
            period_id TEXT NOT NULL,
            authorized_by TEXT NOT NULL,
            authorized_at TEXT NOT NULL,
            details TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            revoked_at TEXT,
            revoked_by TEXT,
            revoke_reason TEXT
        );

        -- At most one active authorization per period.
        CREATE UNIQUE INDEX idx_authorizations_one_active
            ON stamping_authorizations(period_id) WHERE is_active = 1;

        CREATE INDEX idx_authorizations_period ON stamping_authorizations(period_id);

        CREATE TABLE pay_periods (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            authorized_for_stamping INTEGER NOT NULL DEFAULT 0,
            authorized_at TEXT,
            authorized_by TEXT,
            starts_on TEXT NOT NULL,
            ends_on TEXT NOT NULL
        );

        CREATE TABLE users (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL
        );

        CREATE TABLE stamping_credentials (
            company_id TEXT PRIMARY KEY,
            pac_provider TEXT NOT NULL,
            rfc TEXT NOT NULL,
            has_certificate INTEGER NOT NULL,
            has_private_key INTEGER NOT NULL,
            certificate_expires_at TEXT
        );

        -- Append-only audit sink.
        CREATE TABLE audit_log (
            id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            period_id TEXT,
            actor_id TEXT NOT NULL,
            detail TEXT NOT NULL,                 -- JSON
            created_at TEXT NOT NULL
        );

        CREATE INDEX idx_audit_entity ON audit_log(entity_id);
        CREATE INDEX idx_audit_period ON audit_log(period_id);
        "#,
    )?;

    Ok(())
}
