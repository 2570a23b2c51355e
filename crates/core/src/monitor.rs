//! Operator monitor surface
//!
//! Read-only projections over the persisted queue state plus the two manual
//! interventions the pipeline supports: requeueing a parked document and
//! cancelling one that has not reached a terminal state. The UI on top of
//! this is out of scope; these are plain request/response calls.

use std::sync::Arc;

use ekuatia_domain::{DocumentStatus, EkuatiaError, FiscalDocument, QueueRunRecord, Result};
use tracing::{info, instrument};

use crate::ports::{DocumentStore, QueueRunStore};

/// Monitor and operator actions over the submission queue.
pub struct MonitorService {
    documents: Arc<dyn DocumentStore>,
    runs: Arc<dyn QueueRunStore>,
}

impl MonitorService {
    pub fn new(documents: Arc<dyn DocumentStore>, runs: Arc<dyn QueueRunStore>) -> Self {
        Self { documents, runs }
    }

    /// Fetch a single document with its attempt history fields.
    pub async fn document(&self, id: &str) -> Result<FiscalDocument> {
        self.documents
            .get(id)
            .await?
            .ok_or_else(|| EkuatiaError::NotFound(format!("document {id}")))
    }

    /// Documents in a given status, newest first.
    pub async fn documents_by_status(
        &self,
        status: DocumentStatus,
        limit: u32,
    ) -> Result<Vec<FiscalDocument>> {
        self.documents.documents_by_status(status, limit).await
    }

    /// Most recent queue runs, newest first.
    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<QueueRunRecord>> {
        self.runs.recent(limit).await
    }

    /// Requeue a parked document.
    ///
    /// Only documents in `Error` or `Rejected` can be requeued; the attempt
    /// counter resets so the document gets a full retry budget again.
    #[instrument(skip(self))]
    pub async fn retry_now(&self, id: &str) -> Result<FiscalDocument> {
        let mut document = self.document(id).await?;

        match document.status {
            DocumentStatus::Error | DocumentStatus::Rejected => {
                document.status = DocumentStatus::Pending;
                document.attempts = 0;
                document.last_error = None;
                self.documents.update(&document).await?;
                info!(document_id = %id, "document requeued by operator");
                Ok(document)
            }
            other => Err(EkuatiaError::InvalidInput(format!(
                "document {id} cannot be requeued from status {other}"
            ))),
        }
    }

    /// Cancel a document that has not reached a terminal state.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<FiscalDocument> {
        let mut document = self.document(id).await?;

        if document.status.is_terminal() {
            return Err(EkuatiaError::InvalidInput(format!(
                "document {id} is already terminal ({})",
                document.status
            )));
        }

        document.status = DocumentStatus::Cancelled;
        self.documents.update(&document).await?;
        info!(document_id = %id, "document cancelled by operator");
        Ok(document)
    }
}
