//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the nomina ledger. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.
//!
//! Every mutating method re-verifies its preconditions inside the
//! transaction it opens; the partial unique indexes created by the
//! migration reject concurrent writers that slip past the re-check.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use rust_decimal::Decimal;
use uuid::Uuid;

use nomina_core::{
    AuditAction, AuditRecord, AuthorizationId, CompanyId, ContentHash, DocumentId, DocumentKind,
    EmployeeId, FiscalDocument, LineKind, PayConcept, PayPeriod, PeriodId, PeriodStatus, Receipt,
    ReceiptId, ReceiptLine, ReceiptStatus, Role, SnapshotId, SnapshotReason, Stamp, StampStatus,
    StampingAuthorization, StampingCredentials, User, UserId, VersionSnapshot,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{NewDocument, Store, SupersedeRequest};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

fn conv<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conv(idx, e))
}

fn parse_decimal(idx: usize, s: &str) -> rusqlite::Result<Decimal> {
    s.parse::<Decimal>().map_err(|e| conv(idx, e))
}

fn constraint_to_conflict(e: rusqlite::Error, what: &str) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Database(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn receipt_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Receipt> {
    let id: String = row.get("id")?;
    let period_id: String = row.get("period_id")?;
    let employee_id: String = row.get("employee_id")?;
    let parent_id: Option<String> = row.get("parent_id")?;
    let status: String = row.get("status")?;
    let worked_days: String = row.get("worked_days")?;
    let total_perceptions: String = row.get("total_perceptions")?;
    let total_deductions: String = row.get("total_deductions")?;
    let net_pay: String = row.get("net_pay")?;
    let stamp_uuid: Option<String> = row.get("stamp_uuid")?;
    let stamp_status: Option<String> = row.get("stamp_status")?;
    let stamp_at: Option<DateTime<Utc>> = row.get("stamp_at")?;

    let stamp = match (stamp_uuid, stamp_status, stamp_at) {
        (Some(uuid), Some(status), Some(at)) => Some(Stamp {
            uuid: parse_uuid(12, &uuid)?,
            status: StampStatus::parse(&status).map_err(|e| conv(13, e))?,
            stamped_at: at,
        }),
        _ => None,
    };

    Ok(Receipt {
        id: ReceiptId::from_uuid(parse_uuid(0, &id)?),
        period_id: PeriodId::from_uuid(parse_uuid(1, &period_id)?),
        employee_id: EmployeeId::from_uuid(parse_uuid(2, &employee_id)?),
        version: row.get("version")?,
        parent_id: parent_id
            .map(|p| parse_uuid(4, &p).map(ReceiptId::from_uuid))
            .transpose()?,
        active: row.get("active")?,
        superseded_at: row.get("superseded_at")?,
        status: ReceiptStatus::parse(&status).map_err(|e| conv(7, e))?,
        worked_days: parse_decimal(8, &worked_days)?,
        total_perceptions: parse_decimal(9, &total_perceptions)?,
        total_deductions: parse_decimal(10, &total_deductions)?,
        net_pay: parse_decimal(11, &net_pay)?,
        lines: Vec::new(), // filled in by the caller
        stamp,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const RECEIPT_COLUMNS: &str = "id, period_id, employee_id, version, parent_id, active, \
     superseded_at, status, worked_days, total_perceptions, total_deductions, net_pay, \
     stamp_uuid, stamp_status, stamp_at, created_at, updated_at";

fn load_lines(conn: &Connection, receipt_id: &ReceiptId) -> Result<Vec<ReceiptLine>> {
    let mut stmt = conn.prepare(
        "SELECT kind, code, name, amount FROM receipt_lines
         WHERE receipt_id = ?1 ORDER BY position",
    )?;
    let lines = stmt
        .query_map(params![receipt_id.to_string()], |row| {
            let kind: String = row.get(0)?;
            let amount: String = row.get(3)?;
            Ok(ReceiptLine {
                kind: LineKind::parse(&kind).map_err(|e| conv(0, e))?,
                concept: PayConcept {
                    code: row.get(1)?,
                    name: row.get(2)?,
                    amount: parse_decimal(3, &amount)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

fn get_receipt_inner(conn: &Connection, id: &ReceiptId) -> Result<Option<Receipt>> {
    let receipt = conn
        .query_row(
            &format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1"),
            params![id.to_string()],
            receipt_from_row,
        )
        .optional()?;

    match receipt {
        Some(mut r) => {
            r.lines = load_lines(conn, &r.id)?;
            Ok(Some(r))
        }
        None => Ok(None),
    }
}

fn insert_receipt_tx(tx: &Transaction<'_>, receipt: &Receipt) -> Result<()> {
    tx.execute(
        "INSERT INTO receipts (
            id, period_id, employee_id, version, parent_id, active, superseded_at,
            status, worked_days, total_perceptions, total_deductions, net_pay,
            stamp_uuid, stamp_status, stamp_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            receipt.id.to_string(),
            receipt.period_id.to_string(),
            receipt.employee_id.to_string(),
            receipt.version,
            receipt.parent_id.map(|p| p.to_string()),
            receipt.active,
            receipt.superseded_at,
            receipt.status.as_str(),
            receipt.worked_days.to_string(),
            receipt.total_perceptions.to_string(),
            receipt.total_deductions.to_string(),
            receipt.net_pay.to_string(),
            receipt.stamp.map(|s| s.uuid.to_string()),
            receipt.stamp.map(|s| s.status.as_str()),
            receipt.stamp.map(|s| s.stamped_at),
            receipt.created_at,
            receipt.updated_at,
        ],
    )
    .map_err(|e| {
        constraint_to_conflict(
            e,
            "an active receipt already exists for this (period, employee) pair",
        )
    })?;

    for (position, line) in receipt.lines.iter().enumerate() {
        tx.execute(
            "INSERT INTO receipt_lines (receipt_id, position, kind, code, name, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                receipt.id.to_string(),
                position as i64,
                line.kind.as_str(),
                line.concept.code,
                line.concept.name,
                line.concept.amount.to_string(),
            ],
        )?;
    }

    Ok(())
}

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionSnapshot> {
    let id: String = row.get("id")?;
    let receipt_id: String = row.get("receipt_id")?;
    let worked_days: String = row.get("worked_days")?;
    let total_perceptions: String = row.get("total_perceptions")?;
    let total_deductions: String = row.get("total_deductions")?;
    let net_pay: String = row.get("net_pay")?;
    let perceptions: String = row.get("perceptions")?;
    let deductions: String = row.get("deductions")?;
    let reason: String = row.get("reason")?;
    let created_by: String = row.get("created_by")?;
    let stamp_state: String = row.get("stamp_state")?;

    Ok(VersionSnapshot {
        id: SnapshotId::from_uuid(parse_uuid(0, &id)?),
        receipt_id: ReceiptId::from_uuid(parse_uuid(1, &receipt_id)?),
        version: row.get("version")?,
        worked_days: parse_decimal(3, &worked_days)?,
        total_perceptions: parse_decimal(4, &total_perceptions)?,
        total_deductions: parse_decimal(5, &total_deductions)?,
        net_pay: parse_decimal(6, &net_pay)?,
        perceptions: serde_json::from_str(&perceptions).map_err(|e| conv(7, e))?,
        deductions: serde_json::from_str(&deductions).map_err(|e| conv(8, e))?,
        reason: SnapshotReason::parse(&reason).map_err(|e| conv(9, e))?,
        created_by: UserId::from_uuid(parse_uuid(10, &created_by)?),
        stamp_state_at_capture: StampStatus::parse(&stamp_state).map_err(|e| conv(11, e))?,
        created_at: row.get("created_at")?,
    })
}

const SNAPSHOT_COLUMNS: &str = "id, receipt_id, version, worked_days, total_perceptions, \
     total_deductions, net_pay, perceptions, deductions, reason, created_by, stamp_state, \
     created_at";

fn insert_snapshot_tx(tx: &Transaction<'_>, snapshot: &VersionSnapshot) -> Result<()> {
    let perceptions = serde_json::to_string(&snapshot.perceptions)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let deductions = serde_json::to_string(&snapshot.deductions)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    tx.execute(
        "INSERT INTO version_snapshots (
            id, receipt_id, version, worked_days, total_perceptions, total_deductions,
            net_pay, perceptions, deductions, reason, created_by, stamp_state, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            snapshot.id.to_string(),
            snapshot.receipt_id.to_string(),
            snapshot.version,
            snapshot.worked_days.to_string(),
            snapshot.total_perceptions.to_string(),
            snapshot.total_deductions.to_string(),
            snapshot.net_pay.to_string(),
            perceptions,
            deductions,
            snapshot.reason.as_str(),
            snapshot.created_by.to_string(),
            snapshot.stamp_state_at_capture.as_str(),
            snapshot.created_at,
        ],
    )
    .map_err(|e| constraint_to_conflict(e, "snapshot already captured for this version"))?;

    Ok(())
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FiscalDocument> {
    let id: String = row.get("id")?;
    let owner: String = row.get("owner_receipt_id")?;
    let kind: String = row.get("kind")?;
    let content_hash: String = row.get("content_hash")?;
    let deleted_by: Option<String> = row.get("deleted_by")?;
    let created_by: String = row.get("created_by")?;
    let byte_size: i64 = row.get("byte_size")?;

    Ok(FiscalDocument {
        id: DocumentId::from_uuid(parse_uuid(0, &id)?),
        owner_receipt_id: ReceiptId::from_uuid(parse_uuid(1, &owner)?),
        kind: DocumentKind::parse(&kind).map_err(|e| conv(2, e))?,
        version: row.get("version")?,
        content_hash: ContentHash::from_hex(&content_hash).map_err(|e| conv(4, e))?,
        storage_locator: row.get("storage_locator")?,
        byte_size: byte_size as u64,
        file_name: row.get("file_name")?,
        mime_type: row.get("mime_type")?,
        is_active: row.get("is_active")?,
        deleted_at: row.get("deleted_at")?,
        deleted_by: deleted_by
            .map(|u| parse_uuid(11, &u).map(UserId::from_uuid))
            .transpose()?,
        delete_reason: row.get("delete_reason")?,
        created_at: row.get("created_at")?,
        created_by: UserId::from_uuid(parse_uuid(14, &created_by)?),
    })
}

const DOCUMENT_COLUMNS: &str = "id, owner_receipt_id, kind, version, content_hash, \
     storage_locator, byte_size, file_name, mime_type, is_active, deleted_at, deleted_by, \
     delete_reason, created_at, created_by";

fn authorization_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StampingAuthorization> {
    let id: String = row.get("id")?;
    let period_id: String = row.get("period_id")?;
    let authorized_by: String = row.get("authorized_by")?;
    let revoked_by: Option<String> = row.get("revoked_by")?;

    Ok(StampingAuthorization {
        id: AuthorizationId::from_uuid(parse_uuid(0, &id)?),
        period_id: PeriodId::from_uuid(parse_uuid(1, &period_id)?),
        authorized_by: UserId::from_uuid(parse_uuid(2, &authorized_by)?),
        authorized_at: row.get("authorized_at")?,
        details: row.get("details")?,
        is_active: row.get("is_active")?,
        revoked_at: row.get("revoked_at")?,
        revoked_by: revoked_by
            .map(|u| parse_uuid(7, &u).map(UserId::from_uuid))
            .transpose()?,
        revoke_reason: row.get("revoke_reason")?,
    })
}

const AUTHORIZATION_COLUMNS: &str = "id, period_id, authorized_by, authorized_at, details, \
     is_active, revoked_at, revoked_by, revoke_reason";

fn period_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PayPeriod> {
    let id: String = row.get("id")?;
    let company_id: String = row.get("company_id")?;
    let status: String = row.get("status")?;
    let authorized_by: Option<String> = row.get("authorized_by")?;

    Ok(PayPeriod {
        id: PeriodId::from_uuid(parse_uuid(0, &id)?),
        company_id: CompanyId::from_uuid(parse_uuid(1, &company_id)?),
        name: row.get("name")?,
        status: PeriodStatus::parse(&status).map_err(|e| conv(3, e))?,
        authorized_for_stamping: row.get("authorized_for_stamping")?,
        authorized_at: row.get("authorized_at")?,
        authorized_by: authorized_by
            .map(|u| parse_uuid(6, &u).map(UserId::from_uuid))
            .transpose()?,
        starts_on: row.get("starts_on")?,
        ends_on: row.get("ends_on")?,
    })
}

fn audit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    let id: String = row.get("id")?;
    let action: String = row.get("action")?;
    let entity_id: String = row.get("entity_id")?;
    let period_id: Option<String> = row.get("period_id")?;
    let actor_id: String = row.get("actor_id")?;
    let detail: String = row.get("detail")?;

    Ok(AuditRecord {
        id: parse_uuid(0, &id)?,
        action: AuditAction::parse(&action).map_err(|e| conv(1, e))?,
        entity_id: parse_uuid(2, &entity_id)?,
        period_id: period_id
            .map(|p| parse_uuid(3, &p).map(PeriodId::from_uuid))
            .transpose()?,
        actor_id: UserId::from_uuid(parse_uuid(4, &actor_id)?),
        detail: serde_json::from_str(&detail).map_err(|e| conv(5, e))?,
        created_at: row.get("created_at")?,
    })
}

fn append_audit_tx(tx: &Transaction<'_>, record: &AuditRecord) -> Result<()> {
    let detail = serde_json::to_string(&record.detail)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    tx.execute(
        "INSERT INTO audit_log (id, action, entity_id, period_id, actor_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id.to_string(),
            record.action.as_str(),
            record.entity_id.to_string(),
            record.period_id.map(|p| p.to_string()),
            record.actor_id.to_string(),
            detail,
            record.created_at,
        ],
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Store implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn insert_receipt(&self, receipt: &Receipt) -> Result<()> {
        let receipt = receipt.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            insert_receipt_tx(&tx, &receipt)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_receipt(&self, id: &ReceiptId) -> Result<Option<Receipt>> {
        let id = *id;
        self.run(move |conn| get_receipt_inner(conn, &id)).await
    }

    async fn get_active_receipt(
        &self,
        period_id: &PeriodId,
        employee_id: &EmployeeId,
    ) -> Result<Option<Receipt>> {
        let period_id = *period_id;
        let employee_id = *employee_id;
        self.run(move |conn| {
            let receipt = conn
                .query_row(
                    &format!(
                        "SELECT {RECEIPT_COLUMNS} FROM receipts
                         WHERE period_id = ?1 AND employee_id = ?2 AND active = 1"
                    ),
                    params![period_id.to_string(), employee_id.to_string()],
                    receipt_from_row,
                )
                .optional()?;

            match receipt {
                Some(mut r) => {
                    r.lines = load_lines(conn, &r.id)?;
                    Ok(Some(r))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_receipts_for_period(&self, period_id: &PeriodId) -> Result<Vec<Receipt>> {
        let period_id = *period_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECEIPT_COLUMNS} FROM receipts
                 WHERE period_id = ?1 ORDER BY employee_id, version"
            ))?;
            let mut receipts = stmt
                .query_map(params![period_id.to_string()], receipt_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for receipt in &mut receipts {
                receipt.lines = load_lines(conn, &receipt.id)?;
            }
            Ok(receipts)
        })
        .await
    }

    async fn supersede_receipt(&self, request: SupersedeRequest) -> Result<Receipt> {
        self.run(move |conn| {
            let tx = conn.transaction()?;

            // Re-read the current row: the advisory check happened before
            // this transaction and is not authoritative.
            let current = get_receipt_in_tx(&tx, &request.current_id)?
                .ok_or_else(|| StoreError::NotFound(format!("receipt {}", request.current_id)))?;

            if current.is_fiscally_sealed() {
                return Err(StoreError::Immutable(
                    "receipt is fiscally immutable: cancel the stamp first".into(),
                ));
            }
            if !current.active || current.status == ReceiptStatus::Superseded {
                return Err(StoreError::Immutable(
                    "receipt has been superseded: use the current active version".into(),
                ));
            }
            if !current.status.is_recalculable() {
                return Err(StoreError::Immutable(format!(
                    "receipt status {} does not allow recalculation",
                    current.status
                )));
            }
            if request.successor.version != current.version + 1
                || request.successor.parent_id != Some(current.id)
            {
                return Err(StoreError::Conflict(format!(
                    "stale supersession: receipt {} is at version {}",
                    current.id, current.version
                )));
            }
            if request.snapshot.receipt_id != current.id {
                return Err(StoreError::InvalidData(
                    "snapshot does not reference the superseded receipt".into(),
                ));
            }

            insert_snapshot_tx(&tx, &request.snapshot)?;

            let updated = tx.execute(
                "UPDATE receipts SET active = 0, status = ?2, superseded_at = ?3, updated_at = ?3
                 WHERE id = ?1 AND active = 1",
                params![
                    current.id.to_string(),
                    ReceiptStatus::Superseded.as_str(),
                    request.superseded_at,
                ],
            )?;
            if updated != 1 {
                return Err(StoreError::Conflict(format!(
                    "receipt {} was superseded concurrently",
                    current.id
                )));
            }

            insert_receipt_tx(&tx, &request.successor)?;
            append_audit_tx(&tx, &request.audit)?;

            tx.commit()?;
            Ok(request.successor)
        })
        .await
    }

    async fn apply_stamp(
        &self,
        id: &ReceiptId,
        stamp: Option<&Stamp>,
        status: ReceiptStatus,
        audit: &AuditRecord,
    ) -> Result<()> {
        let id = *id;
        let stamp = stamp.copied();
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let now = audit.created_at;

            let updated = match stamp {
                Some(stamp) => tx.execute(
                    "UPDATE receipts SET stamp_uuid = ?2, stamp_status = ?3, stamp_at = ?4,
                            status = ?5, updated_at = ?6
                     WHERE id = ?1",
                    params![
                        id.to_string(),
                        stamp.uuid.to_string(),
                        stamp.status.as_str(),
                        stamp.stamped_at,
                        status.as_str(),
                        now,
                    ],
                )?,
                None => tx.execute(
                    "UPDATE receipts SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id.to_string(), status.as_str(), now],
                )?,
            };
            if updated != 1 {
                return Err(StoreError::NotFound(format!("receipt {}", id)));
            }

            append_audit_tx(&tx, &audit)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_snapshot(
        &self,
        snapshot: &VersionSnapshot,
        audit: &AuditRecord,
    ) -> Result<()> {
        let snapshot = snapshot.clone();
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            insert_snapshot_tx(&tx, &snapshot)?;
            append_audit_tx(&tx, &audit)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_snapshot(
        &self,
        receipt_id: &ReceiptId,
        version: u32,
    ) -> Result<Option<VersionSnapshot>> {
        let receipt_id = *receipt_id;
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM version_snapshots
                     WHERE receipt_id = ?1 AND version = ?2"
                ),
                params![receipt_id.to_string(), version],
                snapshot_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_snapshots_for_receipt(
        &self,
        receipt_id: &ReceiptId,
    ) -> Result<Vec<VersionSnapshot>> {
        let receipt_id = *receipt_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM version_snapshots
                 WHERE receipt_id = ?1 ORDER BY created_at"
            ))?;
            let snapshots = stmt
                .query_map(params![receipt_id.to_string()], snapshot_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(snapshots)
        })
        .await
    }

    async fn next_document_version(&self, owner: &ReceiptId, kind: DocumentKind) -> Result<u32> {
        let owner = *owner;
        self.run(move |conn| {
            let max: u32 = conn.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM fiscal_documents
                 WHERE owner_receipt_id = ?1 AND kind = ?2",
                params![owner.to_string(), kind.as_str()],
                |row| row.get(0),
            )?;
            Ok(max + 1)
        })
        .await
    }

    async fn insert_document_version(
        &self,
        document: NewDocument,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument> {
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            // Version re-check: a concurrent insert may have taken the slot
            // between the vault's read and this transaction.
            let max: u32 = tx.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM fiscal_documents
                 WHERE owner_receipt_id = ?1 AND kind = ?2",
                params![document.owner_receipt_id.to_string(), document.kind.as_str()],
                |row| row.get(0),
            )?;
            if document.version != max + 1 {
                return Err(StoreError::Conflict(format!(
                    "document version {} is stale: next version is {}",
                    document.version,
                    max + 1
                )));
            }

            if !document.allow_duplicate {
                let duplicate: Option<String> = tx
                    .query_row(
                        "SELECT id FROM fiscal_documents
                         WHERE owner_receipt_id = ?1 AND kind = ?2
                           AND content_hash = ?3 AND is_active = 1",
                        params![
                            document.owner_receipt_id.to_string(),
                            document.kind.as_str(),
                            document.content_hash.to_hex(),
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;
                if duplicate.is_some() {
                    return Err(StoreError::Conflict(format!(
                        "identical content ({}) already stored for this receipt and kind",
                        document.content_hash.short()
                    )));
                }
            }

            // Supersede, never delete, the previous active version.
            tx.execute(
                "UPDATE fiscal_documents SET is_active = 0
                 WHERE owner_receipt_id = ?1 AND kind = ?2 AND is_active = 1",
                params![document.owner_receipt_id.to_string(), document.kind.as_str()],
            )?;

            tx.execute(
                "INSERT INTO fiscal_documents (
                    id, owner_receipt_id, kind, version, content_hash, storage_locator,
                    byte_size, file_name, mime_type, is_active, created_at, created_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)",
                params![
                    document.id.to_string(),
                    document.owner_receipt_id.to_string(),
                    document.kind.as_str(),
                    document.version,
                    document.content_hash.to_hex(),
                    document.storage_locator,
                    document.byte_size as i64,
                    document.file_name,
                    document.mime_type,
                    document.created_at,
                    document.created_by.to_string(),
                ],
            )
            .map_err(|e| constraint_to_conflict(e, "document version already exists"))?;

            append_audit_tx(&tx, &audit)?;
            tx.commit()?;

            Ok(FiscalDocument {
                id: document.id,
                owner_receipt_id: document.owner_receipt_id,
                kind: document.kind,
                version: document.version,
                content_hash: document.content_hash,
                storage_locator: document.storage_locator,
                byte_size: document.byte_size,
                file_name: document.file_name,
                mime_type: document.mime_type,
                is_active: true,
                deleted_at: None,
                deleted_by: None,
                delete_reason: None,
                created_at: document.created_at,
                created_by: document.created_by,
            })
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<FiscalDocument>> {
        let id = *id;
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM fiscal_documents WHERE id = ?1"),
                params![id.to_string()],
                document_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_active_document(
        &self,
        owner: &ReceiptId,
        kind: DocumentKind,
    ) -> Result<Option<FiscalDocument>> {
        let owner = *owner;
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM fiscal_documents
                     WHERE owner_receipt_id = ?1 AND kind = ?2 AND is_active = 1"
                ),
                params![owner.to_string(), kind.as_str()],
                document_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_documents_for_owner(&self, owner: &ReceiptId) -> Result<Vec<FiscalDocument>> {
        let owner = *owner;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM fiscal_documents
                 WHERE owner_receipt_id = ?1 ORDER BY kind, version"
            ))?;
            let documents = stmt
                .query_map(params![owner.to_string()], document_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(documents)
        })
        .await
    }

    async fn list_active_documents_for_period(
        &self,
        period_id: &PeriodId,
    ) -> Result<Vec<FiscalDocument>> {
        let period_id = *period_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.owner_receipt_id, d.kind, d.version, d.content_hash,
                        d.storage_locator, d.byte_size, d.file_name, d.mime_type,
                        d.is_active, d.deleted_at, d.deleted_by, d.delete_reason,
                        d.created_at, d.created_by
                 FROM fiscal_documents d
                 JOIN receipts r ON r.id = d.owner_receipt_id
                 WHERE r.period_id = ?1 AND d.is_active = 1
                 ORDER BY d.owner_receipt_id, d.kind",
            )?;
            let documents = stmt
                .query_map(params![period_id.to_string()], document_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(documents)
        })
        .await
    }

    async fn soft_delete_document(
        &self,
        id: &DocumentId,
        actor: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<FiscalDocument> {
        let id = *id;
        let actor = *actor;
        let reason = reason.to_string();
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let document = tx
                .query_row(
                    &format!("SELECT {DOCUMENT_COLUMNS} FROM fiscal_documents WHERE id = ?1"),
                    params![id.to_string()],
                    document_from_row,
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;

            if document.is_deleted() {
                return Err(StoreError::Conflict(format!(
                    "document {} is already deleted",
                    id
                )));
            }

            let now = audit.created_at;
            tx.execute(
                "UPDATE fiscal_documents
                 SET is_active = 0, deleted_at = ?2, deleted_by = ?3, delete_reason = ?4
                 WHERE id = ?1",
                params![id.to_string(), now, actor.to_string(), reason],
            )?;

            append_audit_tx(&tx, &audit)?;
            tx.commit()?;

            Ok(FiscalDocument {
                is_active: false,
                deleted_at: Some(now),
                deleted_by: Some(actor),
                delete_reason: Some(reason),
                ..document
            })
        })
        .await
    }

    async fn insert_authorization(
        &self,
        authorization: &StampingAuthorization,
        audit: &AuditRecord,
    ) -> Result<()> {
        let authorization = authorization.clone();
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO stamping_authorizations (
                    id, period_id, authorized_by, authorized_at, details, is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                params![
                    authorization.id.to_string(),
                    authorization.period_id.to_string(),
                    authorization.authorized_by.to_string(),
                    authorization.authorized_at,
                    authorization.details,
                ],
            )
            .map_err(|e| {
                constraint_to_conflict(e, "period already has an active stamping authorization")
            })?;

            tx.execute(
                "UPDATE pay_periods
                 SET authorized_for_stamping = 1, authorized_at = ?2, authorized_by = ?3
                 WHERE id = ?1",
                params![
                    authorization.period_id.to_string(),
                    authorization.authorized_at,
                    authorization.authorized_by.to_string(),
                ],
            )?;

            append_audit_tx(&tx, &audit)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_active_authorization(
        &self,
        period_id: &PeriodId,
    ) -> Result<Option<StampingAuthorization>> {
        let period_id = *period_id;
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {AUTHORIZATION_COLUMNS} FROM stamping_authorizations
                     WHERE period_id = ?1 AND is_active = 1"
                ),
                params![period_id.to_string()],
                authorization_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_authorizations(
        &self,
        period_id: &PeriodId,
    ) -> Result<Vec<StampingAuthorization>> {
        let period_id = *period_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUTHORIZATION_COLUMNS} FROM stamping_authorizations
                 WHERE period_id = ?1 ORDER BY authorized_at"
            ))?;
            let authorizations = stmt
                .query_map(params![period_id.to_string()], authorization_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(authorizations)
        })
        .await
    }

    async fn deactivate_authorization(
        &self,
        period_id: &PeriodId,
        revoked_by: &UserId,
        reason: &str,
        audit: &AuditRecord,
    ) -> Result<StampingAuthorization> {
        let period_id = *period_id;
        let revoked_by = *revoked_by;
        let reason = reason.to_string();
        let audit = audit.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let authorization = tx
                .query_row(
                    &format!(
                        "SELECT {AUTHORIZATION_COLUMNS} FROM stamping_authorizations
                         WHERE period_id = ?1 AND is_active = 1"
                    ),
                    params![period_id.to_string()],
                    authorization_from_row,
                )
                .optional()?
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "no active stamping authorization for period {}",
                        period_id
                    ))
                })?;

            let now = audit.created_at;
            tx.execute(
                "UPDATE stamping_authorizations
                 SET is_active = 0, revoked_at = ?2, revoked_by = ?3, revoke_reason = ?4
                 WHERE id = ?1",
                params![
                    authorization.id.to_string(),
                    now,
                    revoked_by.to_string(),
                    reason,
                ],
            )?;

            tx.execute(
                "UPDATE pay_periods
                 SET authorized_for_stamping = 0, authorized_at = NULL, authorized_by = NULL
                 WHERE id = ?1",
                params![period_id.to_string()],
            )?;

            append_audit_tx(&tx, &audit)?;
            tx.commit()?;

            Ok(StampingAuthorization {
                is_active: false,
                revoked_at: Some(now),
                revoked_by: Some(revoked_by),
                revoke_reason: Some(reason),
                ..authorization
            })
        })
        .await
    }

    async fn upsert_period(&self, period: &PayPeriod) -> Result<()> {
        let period = period.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO pay_periods (
                    id, company_id, name, status, authorized_for_stamping,
                    authorized_at, authorized_by, starts_on, ends_on
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    status = excluded.status,
                    authorized_for_stamping = excluded.authorized_for_stamping,
                    authorized_at = excluded.authorized_at,
                    authorized_by = excluded.authorized_by,
                    starts_on = excluded.starts_on,
                    ends_on = excluded.ends_on",
                params![
                    period.id.to_string(),
                    period.company_id.to_string(),
                    period.name,
                    period.status.as_str(),
                    period.authorized_for_stamping,
                    period.authorized_at,
                    period.authorized_by.map(|u| u.to_string()),
                    period.starts_on,
                    period.ends_on,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_period(&self, id: &PeriodId) -> Result<Option<PayPeriod>> {
        let id = *id;
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, company_id, name, status, authorized_for_stamping,
                        authorized_at, authorized_by, starts_on, ends_on
                 FROM pay_periods WHERE id = ?1",
                params![id.to_string()],
                period_from_row,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (id, company_id, name, role) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    company_id = excluded.company_id,
                    name = excluded.name,
                    role = excluded.role",
                params![
                    user.id.to_string(),
                    user.company_id.to_string(),
                    user.name,
                    user.role.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = *id;
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, company_id, name, role FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    let user_id: String = row.get(0)?;
                    let company_id: String = row.get(1)?;
                    let role: String = row.get(3)?;
                    Ok(User {
                        id: UserId::from_uuid(parse_uuid(0, &user_id)?),
                        company_id: CompanyId::from_uuid(parse_uuid(1, &company_id)?),
                        name: row.get(2)?,
                        role: Role::parse(&role).map_err(|e| conv(3, e))?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert_credentials(&self, credentials: &StampingCredentials) -> Result<()> {
        let credentials = credentials.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO stamping_credentials (
                    company_id, pac_provider, rfc, has_certificate, has_private_key,
                    certificate_expires_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(company_id) DO UPDATE SET
                    pac_provider = excluded.pac_provider,
                    rfc = excluded.rfc,
                    has_certificate = excluded.has_certificate,
                    has_private_key = excluded.has_private_key,
                    certificate_expires_at = excluded.certificate_expires_at",
                params![
                    credentials.company_id.to_string(),
                    credentials.pac_provider,
                    credentials.rfc,
                    credentials.has_certificate,
                    credentials.has_private_key,
                    credentials.certificate_expires_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_credentials(
        &self,
        company_id: &CompanyId,
    ) -> Result<Option<StampingCredentials>> {
        let company_id = *company_id;
        self.run(move |conn| {
            conn.query_row(
                "SELECT company_id, pac_provider, rfc, has_certificate, has_private_key,
                        certificate_expires_at
                 FROM stamping_credentials WHERE company_id = ?1",
                params![company_id.to_string()],
                |row| {
                    let company: String = row.get(0)?;
                    Ok(StampingCredentials {
                        company_id: CompanyId::from_uuid(parse_uuid(0, &company)?),
                        pac_provider: row.get(1)?,
                        rfc: row.get(2)?,
                        has_certificate: row.get(3)?,
                        has_private_key: row.get(4)?,
                        certificate_expires_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            append_audit_tx(&tx, &record)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditRecord>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, action, entity_id, period_id, actor_id, detail, created_at
                 FROM audit_log WHERE entity_id = ?1 ORDER BY created_at",
            )?;
            let records = stmt
                .query_map(params![entity_id.to_string()], audit_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

/// Read a receipt and its lines inside an open transaction.
fn get_receipt_in_tx(tx: &Transaction<'_>, id: &ReceiptId) -> Result<Option<Receipt>> {
    let receipt = tx
        .query_row(
            &format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1"),
            params![id.to_string()],
            receipt_from_row,
        )
        .optional()?;

    match receipt {
        Some(mut r) => {
            r.lines = load_lines(tx, &r.id)?;
            Ok(Some(r))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomina_core::{AuditAction, PayFigures, SnapshotReason};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn figures(salary: i64) -> PayFigures {
        PayFigures::new(
            Decimal::from(15),
            vec![PayConcept::new("P001", "Sueldo", Decimal::from(salary))],
            vec![PayConcept::new("D001", "ISR", Decimal::from(1_200))],
        )
    }

    fn audit_for(receipt: &Receipt) -> AuditRecord {
        AuditRecord::new(
            AuditAction::ReceiptRecalculated,
            receipt.id.as_uuid(),
            UserId::new(),
            json!({}),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_receipt() {
        let store = SqliteStore::open_memory().unwrap();
        let receipt = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(10_000), Utc::now());

        store.insert_receipt(&receipt).await.unwrap();

        let loaded = store.get_receipt(&receipt.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.net_pay, Decimal::from(8_800));
        assert_eq!(loaded.lines.len(), 2);
        assert_eq!(loaded.lines[0].concept.code, "P001");
    }

    #[tokio::test]
    async fn test_active_uniqueness_enforced() {
        let store = SqliteStore::open_memory().unwrap();
        let period = PeriodId::new();
        let employee = EmployeeId::new();

        let first = Receipt::initial(period, employee, &figures(10_000), Utc::now());
        store.insert_receipt(&first).await.unwrap();

        // A second active row for the same pair must be rejected by the
        // partial unique index.
        let second = Receipt::initial(period, employee, &figures(11_000), Utc::now());
        let result = store.insert_receipt(&second).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_supersede_receipt() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        let actor = UserId::new();
        let v1 = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(10_000), now);
        store.insert_receipt(&v1).await.unwrap();

        let v2 = v1.successor(&figures(11_000), now);
        let snapshot = VersionSnapshot::capture(&v1, SnapshotReason::Recalculation, actor, now);
        let request = SupersedeRequest {
            current_id: v1.id,
            snapshot,
            successor: v2.clone(),
            superseded_at: now,
            audit: audit_for(&v1),
        };

        let persisted = store.supersede_receipt(request).await.unwrap();
        assert_eq!(persisted.version, 2);

        let old = store.get_receipt(&v1.id).await.unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.status, ReceiptStatus::Superseded);
        assert!(old.superseded_at.is_some());
        // Financial figures of the superseded row are untouched.
        assert_eq!(old.net_pay, Decimal::from(8_800));

        let active = store
            .get_active_receipt(&v1.period_id, &v1.employee_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, v2.id);

        let snap = store.get_snapshot(&v1.id, 1).await.unwrap().unwrap();
        assert_eq!(snap.net_pay, Decimal::from(8_800));

        let trail = store.list_audit_for_entity(v1.id.as_uuid()).await.unwrap();
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn test_supersede_rechecks_inside_transaction() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        let actor = UserId::new();
        let v1 = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(10_000), now);
        store.insert_receipt(&v1).await.unwrap();

        // Stamp the receipt after the (hypothetical) advisory check.
        let stamp = Stamp::stamped(Uuid::new_v4(), now);
        store
            .apply_stamp(&v1.id, Some(&stamp), ReceiptStatus::StampOk, &audit_for(&v1))
            .await
            .unwrap();

        let v2 = v1.successor(&figures(11_000), now);
        let request = SupersedeRequest {
            current_id: v1.id,
            snapshot: VersionSnapshot::capture(&v1, SnapshotReason::Recalculation, actor, now),
            successor: v2,
            superseded_at: now,
            audit: audit_for(&v1),
        };

        let result = store.supersede_receipt(request).await;
        assert!(matches!(result, Err(StoreError::Immutable(_))));

        // The original row is untouched.
        let unchanged = store.get_receipt(&v1.id).await.unwrap().unwrap();
        assert!(unchanged.active);
        assert_eq!(unchanged.status, ReceiptStatus::StampOk);
    }

    #[tokio::test]
    async fn test_document_versioning_and_dedup() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        let owner = ReceiptId::new();
        let actor = UserId::new();
        let hash = ContentHash::digest(b"<xml/>");

        let doc = |version: u32, allow_duplicate: bool| NewDocument {
            id: DocumentId::new(),
            owner_receipt_id: owner,
            kind: DocumentKind::OriginalXml,
            version,
            content_hash: hash,
            storage_locator: format!("c/p/{}/original_xml/v{}.bin", owner, version),
            byte_size: 6,
            file_name: Some("nomina.xml".into()),
            mime_type: Some("application/xml".into()),
            created_by: actor,
            created_at: now,
            allow_duplicate,
        };
        let audit = || {
            AuditRecord::new(
                AuditAction::DocumentStored,
                owner.as_uuid(),
                actor,
                json!({"hash": hash.short()}),
                now,
            )
        };

        let v1 = store
            .insert_document_version(doc(1, false), &audit())
            .await
            .unwrap();
        assert!(v1.is_active);

        // Same bytes, duplicates not allowed.
        let result = store.insert_document_version(doc(2, false), &audit()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // Same bytes, duplicates allowed: v2 supersedes v1.
        let v2 = store
            .insert_document_version(doc(2, true), &audit())
            .await
            .unwrap();
        assert_eq!(v2.version, 2);

        let old = store.get_document(&v1.id).await.unwrap().unwrap();
        assert!(!old.is_active);
        assert!(!old.is_deleted());

        let active = store
            .get_active_document(&owner, DocumentKind::OriginalXml)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, v2.id);

        assert_eq!(
            store
                .next_document_version(&owner, DocumentKind::OriginalXml)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_soft_delete_document() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        let owner = ReceiptId::new();
        let actor = UserId::new();

        let new_doc = NewDocument {
            id: DocumentId::new(),
            owner_receipt_id: owner,
            kind: DocumentKind::Pdf,
            version: 1,
            content_hash: ContentHash::digest(b"pdf"),
            storage_locator: "x/v1.bin".into(),
            byte_size: 3,
            file_name: None,
            mime_type: None,
            created_by: actor,
            created_at: now,
            allow_duplicate: false,
        };
        let audit = || {
            AuditRecord::new(
                AuditAction::DocumentDeleted,
                new_doc.id.as_uuid(),
                actor,
                json!({}),
                now,
            )
        };
        let doc = store
            .insert_document_version(new_doc.clone(), &audit())
            .await
            .unwrap();

        let deleted = store
            .soft_delete_document(&doc.id, &actor, "re-issued", &audit())
            .await
            .unwrap();
        assert!(deleted.is_deleted());
        assert_eq!(deleted.delete_reason.as_deref(), Some("re-issued"));

        // Double delete is rejected; the row is still there.
        let result = store
            .soft_delete_document(&doc.id, &actor, "again", &audit())
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.get_document(&doc.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_authorization_lifecycle() {
        let store = SqliteStore::open_memory().unwrap();
        let now = Utc::now();
        let actor = UserId::new();
        let period = PayPeriod::new(
            CompanyId::new(),
            "2026-01 Q1",
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        );
        store.upsert_period(&period).await.unwrap();

        let auth = StampingAuthorization::new(period.id, actor, Some("ready".into()), now);
        let audit = || {
            AuditRecord::new(
                AuditAction::StampingAuthorized,
                auth.id.as_uuid(),
                actor,
                json!({}),
                now,
            )
        };
        store.insert_authorization(&auth, &audit()).await.unwrap();

        // Period flags follow the authorization in the same transaction.
        let loaded = store.get_period(&period.id).await.unwrap().unwrap();
        assert!(loaded.authorized_for_stamping);
        assert_eq!(loaded.authorized_by, Some(actor));

        // Second active authorization is a conflict.
        let again = StampingAuthorization::new(period.id, actor, None, now);
        assert!(matches!(
            store.insert_authorization(&again, &audit()).await,
            Err(StoreError::Conflict(_))
        ));

        let revoked = store
            .deactivate_authorization(&period.id, &actor, "figures changed", &audit())
            .await
            .unwrap();
        assert!(!revoked.is_active);
        assert_eq!(revoked.revoke_reason.as_deref(), Some("figures changed"));

        let cleared = store.get_period(&period.id).await.unwrap().unwrap();
        assert!(!cleared.authorized_for_stamping);
        assert!(store
            .get_active_authorization(&period.id)
            .await
            .unwrap()
            .is_none());

        // History retained.
        assert_eq!(store.list_authorizations(&period.id).await.unwrap().len(), 1);

        // Nothing left to revoke.
        assert!(matches!(
            store
                .deactivate_authorization(&period.id, &actor, "again", &audit())
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_users_and_credentials() {
        let store = SqliteStore::open_memory().unwrap();
        let company = CompanyId::new();

        let user = User {
            id: UserId::new(),
            company_id: company,
            name: "Ana".into(),
            role: Role::PayrollManager,
        };
        store.upsert_user(&user).await.unwrap();
        assert_eq!(store.get_user(&user.id).await.unwrap().unwrap().role, Role::PayrollManager);

        let credentials = StampingCredentials {
            company_id: company,
            pac_provider: "pac-demo".into(),
            rfc: "AAA010101AAA".into(),
            has_certificate: true,
            has_private_key: true,
            certificate_expires_at: Some(Utc::now()),
        };
        store.upsert_credentials(&credentials).await.unwrap();
        let loaded = store.get_credentials(&company).await.unwrap().unwrap();
        assert!(loaded.is_configured());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nomina.db");

        let receipt = Receipt::initial(PeriodId::new(), EmployeeId::new(), &figures(10_000), Utc::now());
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_receipt(&receipt).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_receipt(&receipt.id).await.unwrap().unwrap();
        assert_eq!(loaded.net_pay, receipt.net_pay);
    }
}
