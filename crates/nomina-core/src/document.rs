//! Fiscal document metadata: content-addressed, versioned artifacts.
//!
//! The bytes live in a blob store at `storage_locator`; this record carries
//! the hash, version, and soft-delete bookkeeping. Documents are superseded,
//! never overwritten, and soft-deleted, never physically removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::hash::ContentHash;
use crate::types::{DocumentId, ReceiptId, UserId};

/// What kind of fiscal artifact a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// The pre-stamp payroll XML.
    OriginalXml,
    /// The stamped XML returned by the authority. Protected while the
    /// owning receipt's stamp is active.
    StampedXml,
    /// Request sent to cancel a stamp.
    CancellationRequest,
    /// Acknowledgement of a completed cancellation.
    CancellationAck,
    /// Rendered PDF of the receipt.
    Pdf,
    /// Generated audit report.
    AuditReport,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::OriginalXml => "original_xml",
            DocumentKind::StampedXml => "stamped_xml",
            DocumentKind::CancellationRequest => "cancellation_request",
            DocumentKind::CancellationAck => "cancellation_ack",
            DocumentKind::Pdf => "pdf",
            DocumentKind::AuditReport => "audit_report",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "original_xml" => Ok(DocumentKind::OriginalXml),
            "stamped_xml" => Ok(DocumentKind::StampedXml),
            "cancellation_request" => Ok(DocumentKind::CancellationRequest),
            "cancellation_ack" => Ok(DocumentKind::CancellationAck),
            "pdf" => Ok(DocumentKind::Pdf),
            "audit_report" => Ok(DocumentKind::AuditReport),
            other => Err(CoreError::UnknownDocumentKind(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one stored fiscal artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalDocument {
    pub id: DocumentId,
    /// The receipt this artifact belongs to.
    pub owner_receipt_id: ReceiptId,
    pub kind: DocumentKind,
    /// Monotonic per (owner, kind), starting at 1.
    pub version: u32,

    pub content_hash: ContentHash,
    /// Deterministic location of the bytes in the blob store.
    pub storage_locator: String,
    pub byte_size: u64,

    pub file_name: Option<String>,
    pub mime_type: Option<String>,

    /// False once superseded by a newer version or soft-deleted.
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
    pub delete_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl FiscalDocument {
    /// Whether this document has been soft-deleted (as opposed to merely
    /// superseded by a newer version).
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
