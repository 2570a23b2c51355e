//! Port interfaces for the submission pipeline
//!
//! Infrastructure adapters implement these traits; the services in this
//! crate depend only on the traits. Storage ports return the shared domain
//! `Result`; the signer and transport ports carry their own error/outcome
//! types because the state machine branches on them.

use async_trait::async_trait;
use ekuatia_domain::{
    CanonicalDocument, CompanyProfile, DocumentStatus, FiscalDocument, QueueRunRecord, Result,
    SignedDocument, SubmissionCycleConfig,
};
use thiserror::Error;

/// Trait for the fiscal-document store.
///
/// Rows are owned by the queue manager once enqueued; `claim_for_processing`
/// is the optimistic gate that keeps two cycle instances (e.g. after a
/// crash-restart race) from processing the same document twice.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document row (enqueue path, status `Pending`).
    async fn insert(&self, document: &FiscalDocument) -> Result<()>;

    /// Fetch a document by id.
    async fn get(&self, id: &str) -> Result<Option<FiscalDocument>>;

    /// Select up to `limit` selectable documents, oldest first.
    async fn select_for_cycle(&self, limit: u32) -> Result<Vec<FiscalDocument>>;

    /// Documents awaiting an authority verdict, oldest first.
    async fn submitted_for_reconciliation(&self, limit: u32) -> Result<Vec<FiscalDocument>>;

    /// Atomically transition a selectable document to `Building`.
    ///
    /// Returns `false` when the row was already claimed, cancelled, or
    /// otherwise left the selectable set.
    async fn claim_for_processing(&self, id: &str) -> Result<bool>;

    /// Whether a CDC is already assigned to a different document.
    async fn cdc_exists(&self, cdc: &str, excluding_id: &str) -> Result<bool>;

    /// Persist the full document row.
    async fn update(&self, document: &FiscalDocument) -> Result<()>;

    /// Documents in a given status, newest first (monitor surface).
    async fn documents_by_status(
        &self,
        status: DocumentStatus,
        limit: u32,
    ) -> Result<Vec<FiscalDocument>>;
}

/// Trait for loading the cycle configuration snapshot.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the current configuration; absent rows yield the defaults.
    async fn load(&self) -> Result<SubmissionCycleConfig>;
}

/// Trait for resolving issuing companies.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<CompanyProfile>>;
}

/// Trait for recording queue runs.
#[async_trait]
pub trait QueueRunStore: Send + Sync {
    /// Persist a completed run record.
    async fn record(&self, run: &QueueRunRecord) -> Result<()>;

    /// Most recent runs, newest first (monitor surface).
    async fn recent(&self, limit: u32) -> Result<Vec<QueueRunRecord>>;
}

/// Signing failures.
///
/// Certificate problems are permanent until an operator rotates the
/// certificate; crypto hiccups are retryable.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("certificate expired: {0}")]
    CertificateExpired(String),

    #[error("crypto failure: {0}")]
    CryptoFailure(String),
}

impl SignError {
    /// Permanent failures park the document in `Error` immediately.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::CertificateNotFound(_) | Self::CertificateExpired(_))
    }
}

/// Trait for producing the signature artifact of a canonical document.
#[async_trait]
pub trait DocumentSigner: Send + Sync {
    /// Sign the canonical document with the company certificate.
    ///
    /// Must be idempotent: identical inputs and certificate produce an
    /// identical artifact.
    async fn sign(
        &self,
        canonical: &CanonicalDocument,
        company: &CompanyProfile,
    ) -> std::result::Result<SignedDocument, SignError>;
}

/// A signed document plus the context the transport needs to deliver it.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub company: CompanyProfile,
    pub canonical: CanonicalDocument,
    pub signed: SignedDocument,
}

/// Classified result of a submission exchange.
///
/// The transport classifies; it never retries. All retry decisions belong
/// to the queue manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Authority confirmed the document and assigned a protocol number.
    Accepted { protocol_number: String },
    /// Batch endpoint received the document; verdict arrives asynchronously.
    Queued { batch_id: Option<String> },
    /// Definitive authority rejection; not retryable.
    Rejected { code: String, message: String },
    /// Timeout / 5xx / connection failure; retryable.
    Transient { reason: String },
    /// Ambiguous response; must be reconciled via status query before any
    /// further submit.
    Unknown { reason: String },
}

/// Result of a status query for a previously submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    Accepted { protocol_number: Option<String> },
    Rejected { code: String, message: String },
    /// Authority is still processing; keep waiting.
    InProcess,
    /// Authority has no record of the CDC; safe to resubmit.
    NotFound,
    /// The query itself failed transiently; try again next cycle.
    Unavailable { reason: String },
}

/// Result of a RUC registry query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RucReport {
    pub ruc: String,
    pub name: Option<String>,
    pub active: bool,
}

/// Trait for the authority transport.
#[async_trait]
pub trait FiscalTransport: Send + Sync {
    /// Submit a single signed document.
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome>;

    /// Submit a batch of signed documents to the asynchronous endpoint.
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> Result<Vec<SubmissionOutcome>>;

    /// Query the verdict for a CDC.
    async fn query_status(&self, company: &CompanyProfile, cdc: &str) -> Result<StatusReport>;

    /// Query the taxpayer registry.
    async fn query_ruc(&self, company: &CompanyProfile, ruc: &str) -> Result<RucReport>;
}
