//! Fiscal document model types
//!
//! These types represent the persisted document rows and the canonical
//! payload produced by the builder. Rows are created in `Pending` state by
//! the sales workflow and mutated exclusively by the queue manager; they are
//! never deleted, terminal statuses supersede.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::receiver::Receiver;

/// Document kind, a subset of the SIFEN document-type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Electronic invoice (catalog code "01")
    Invoice,
    /// Electronic credit note (catalog code "05")
    CreditNote,
}

impl DocumentKind {
    /// Two-digit catalog code used in the CDC and the wire payload.
    pub fn catalog_code(self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::CreditNote => "05",
        }
    }
}

crate::impl_status_conversions!(DocumentKind {
    Invoice => "invoice",
    CreditNote => "credit_note",
});

/// Lifecycle status of a fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Building,
    Signed,
    Submitted,
    Accepted,
    Rejected,
    Error,
    Cancelled,
}

crate::impl_status_conversions!(DocumentStatus {
    Pending => "pending",
    Building => "building",
    Signed => "signed",
    Submitted => "submitted",
    Accepted => "accepted",
    Rejected => "rejected",
    Error => "error",
    Cancelled => "cancelled",
});

impl DocumentStatus {
    /// Terminal statuses are never re-selected by the queue.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Error | Self::Cancelled)
    }

    /// Statuses eligible for selection at the start of a cycle.
    pub fn is_selectable(self) -> bool {
        matches!(self, Self::Pending | Self::Signed)
    }
}

/// Unique numbering of a document within a timbrado authorization.
///
/// The tuple (timbrado, establishment, point_of_sale, series, number) is
/// unique at the storage layer; the builder refuses to sign a document whose
/// derived CDC collides with an already-issued one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNumber {
    /// Numbering authorization issued by the tax authority.
    pub timbrado: String,
    /// Establishment (branch) code, printed as 3 digits.
    pub establishment: String,
    /// Point-of-sale (register) code, printed as 3 digits.
    pub point_of_sale: String,
    /// Optional series letter pair within the timbrado.
    pub series: Option<String>,
    /// Sequential document number, printed as 7 digits.
    pub number: u32,
}

impl std::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0>3}-{:0>3}-{:07}", self.establishment, self.point_of_sale, self.number)
    }
}

/// One fiscal document row, created per sale or credit note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalDocument {
    /// UUIDv7 primary key.
    pub id: String,
    /// Reference to the originating sale / credit note.
    pub source_id: String,
    /// Issuing company.
    pub company_id: String,
    pub kind: DocumentKind,
    pub timbrado: String,
    pub establishment: String,
    pub point_of_sale: String,
    pub series: Option<String>,
    pub number: u32,
    /// Source sale/credit-note snapshot, written at enqueue time.
    pub snapshot_json: Option<String>,
    /// 44-digit control code, assigned on first build.
    pub cdc: Option<String>,
    /// 9-digit security code, generated on first build.
    pub security_code: Option<String>,
    /// Canonical payload produced by the builder.
    pub payload_json: Option<String>,
    /// Signature artifact produced by the signer.
    pub signed_payload: Option<String>,
    /// QR verification URL, populated at signing.
    pub qr_url: Option<String>,
    /// Authority-assigned protocol number on acceptance.
    pub protocol_number: Option<String>,
    pub status: DocumentStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<i64>,
    /// Issue date of the underlying sale (epoch seconds).
    pub issued_at: i64,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl FiscalDocument {
    /// Numbering tuple view over the flattened columns.
    pub fn document_number(&self) -> DocumentNumber {
        DocumentNumber {
            timbrado: self.timbrado.clone(),
            establishment: self.establishment.clone(),
            point_of_sale: self.point_of_sale.clone(),
            series: self.series.clone(),
            number: self.number,
        }
    }

    /// Issue date as a chrono date, if the stored timestamp is valid.
    pub fn issue_date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.issued_at, 0).map(|dt| dt.date_naive())
    }

    /// Issue timestamp as `DateTime<Utc>`.
    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }
}

/// One line of the source sale, snapshotted into the canonical payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    /// Unit price in the document currency (guaraníes have no decimals).
    pub unit_price: i64,
    pub line_total: i64,
    pub vat_amount: i64,
}

/// Monetary totals of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub total: i64,
    pub vat_total: i64,
}

/// Canonical fiscal-document representation produced by the builder.
///
/// This is the structure that gets persisted as `payload_json`, signed, and
/// transmitted. It is fully derived from the source snapshot plus the
/// assigned CDC and security code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    pub cdc: String,
    pub security_code: String,
    pub kind: DocumentKind,
    pub issuer_ruc: String,
    pub issuer_ruc_dv: u8,
    pub number: DocumentNumber,
    /// Issue timestamp, ISO-8601 without offset as the QR template expects.
    pub issued_at: String,
    pub receiver: Receiver,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub totals: DocumentTotals,
}

impl CanonicalDocument {
    /// Serialized payload stored on the document row.
    pub fn to_payload_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::EkuatiaError::Internal(format!("payload serialization: {e}")))
    }
}

/// Source-side snapshot handed to the builder together with the row.
///
/// Produced by the sales workflow at commit time; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub receiver: Receiver,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub totals: DocumentTotals,
}

impl SaleSnapshot {
    /// Parse the snapshot stored on a document row.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::EkuatiaError::InvalidInput(format!("sale snapshot: {e}")))
    }
}

/// Signature artifact persisted on the document row after signing.
///
/// Signing is idempotent: the same canonical document and certificate
/// produce an identical artifact, so a retried cycle never replaces a good
/// signature with a different one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    /// Signature suite identifier.
    pub algorithm: String,
    /// SHA-256 digest of the canonical payload, base64.
    pub digest: String,
    /// Detached signature over the canonical payload, base64.
    pub signature: String,
    /// QR verification URL derived from the authority template.
    pub qr_url: String,
}

impl SignedDocument {
    /// Serialized artifact stored on the document row.
    pub fn to_artifact_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::EkuatiaError::Internal(format!("signature serialization: {e}")))
    }

    /// Parse a stored artifact.
    pub fn from_artifact_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::EkuatiaError::InvalidInput(format!("signature artifact: {e}")))
    }
}
