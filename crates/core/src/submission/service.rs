//! Submission cycle orchestration.
//!
//! One `run_cycle` call drives a bounded batch of documents through
//! build → sign → submit and reconciles previously submitted documents
//! whose verdict is still outstanding. The service owns every status
//! transition after enqueue; the scheduler in the infra crate only decides
//! *when* a cycle runs.
//!
//! Retry policy: permanent failures park the document (`Error` /
//! `Rejected`) until an operator requeues it; retryable failures send it
//! back to `Pending` for the *next* cycle, never looping within the same
//! cycle, so one bad document cannot monopolize a run.

use std::sync::Arc;

use chrono::Utc;
use ekuatia_domain::constants::MAX_ERROR_TEXT_LEN;
use ekuatia_domain::{
    DocumentStatus, EkuatiaError, FiscalDocument, QueueRunRecord, Result, SubmissionCycleConfig,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::build::{BuildError, DocumentBuilder};
use crate::ports::{
    CompanyStore, ConfigStore, DocumentSigner, DocumentStore, FiscalTransport, QueueRunStore,
    StatusReport, SubmissionOutcome, SubmissionRequest,
};

/// Outcome of one cycle, mirrored into the persisted run record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub run_id: String,
    /// False when the cycle was skipped because the queue is inactive.
    pub active: bool,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Previously submitted documents whose verdict was resolved.
    pub reconciled: u32,
}

/// Drives pending fiscal documents through build, sign, and submit.
pub struct SubmissionService {
    documents: Arc<dyn DocumentStore>,
    companies: Arc<dyn CompanyStore>,
    config: Arc<dyn ConfigStore>,
    runs: Arc<dyn QueueRunStore>,
    signer: Arc<dyn DocumentSigner>,
    transport: Arc<dyn FiscalTransport>,
    builder: DocumentBuilder,
}

impl SubmissionService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        companies: Arc<dyn CompanyStore>,
        config: Arc<dyn ConfigStore>,
        runs: Arc<dyn QueueRunStore>,
        signer: Arc<dyn DocumentSigner>,
        transport: Arc<dyn FiscalTransport>,
    ) -> Self {
        Self {
            documents,
            companies,
            config,
            runs,
            signer,
            transport,
            builder: DocumentBuilder::new(),
        }
    }

    /// Execute one queue cycle.
    ///
    /// Every cycle records a run, including inactive and zero-work cycles.
    /// Per-document failures are absorbed into the summary; only storage
    /// faults that would lose state bubble up as errors.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let config = self.config.load().await?.clamped();
        let started_at = Utc::now().timestamp();
        let run_id = Uuid::now_v7().to_string();

        let mut summary = CycleSummary {
            run_id: run_id.clone(),
            active: config.active,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            reconciled: 0,
        };

        if !config.active {
            debug!("submission queue inactive, recording zero-work cycle");
            self.record_run(&run_id, started_at, &summary).await?;
            return Ok(summary);
        }

        let mut fatal: Vec<String> = Vec::new();

        // Resolve outstanding verdicts before sending anything new; an
        // ambiguous earlier response must never lead to a duplicate submit.
        match self.documents.submitted_for_reconciliation(config.max_documents_per_cycle).await {
            Ok(outstanding) => {
                for document in outstanding {
                    if let Err(e) = self.reconcile_document(document, &config, &mut summary).await {
                        error!(error = %e, "reconciliation failed");
                        fatal.push(e.to_string());
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to load submitted documents");
                fatal.push(e.to_string());
            }
        }

        match self.documents.select_for_cycle(config.max_documents_per_cycle).await {
            Ok(batch) => {
                if !batch.is_empty() {
                    info!(count = batch.len(), "processing submission batch");
                }
                for document in batch {
                    if let Err(e) = self.process_document(document, &config, &mut summary).await {
                        error!(error = %e, "document processing failed");
                        fatal.push(e.to_string());
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to select documents for cycle");
                fatal.push(e.to_string());
            }
        }

        self.record_run(&run_id, started_at, &summary).await?;

        if fatal.is_empty() {
            Ok(summary)
        } else {
            Err(EkuatiaError::Internal(fatal.join("; ")))
        }
    }

    async fn record_run(
        &self,
        run_id: &str,
        started_at: i64,
        summary: &CycleSummary,
    ) -> Result<()> {
        let record = QueueRunRecord {
            id: run_id.to_string(),
            started_at,
            finished_at: Some(Utc::now().timestamp()),
            attempted: summary.attempted,
            succeeded: summary.succeeded,
            failed: summary.failed,
        };
        self.runs.record(&record).await
    }

    /// Drive one document through build → sign → submit.
    #[instrument(skip(self, document, config, summary), fields(document_id = %document.id))]
    async fn process_document(
        &self,
        mut document: FiscalDocument,
        config: &SubmissionCycleConfig,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        if !self.documents.claim_for_processing(&document.id).await? {
            debug!(document_id = %document.id, "document no longer claimable, skipping");
            return Ok(());
        }
        document.status = DocumentStatus::Building;
        summary.attempted += 1;

        let Some(company) = self.companies.get(&document.company_id).await? else {
            warn!(document_id = %document.id, company_id = %document.company_id, "issuing company not configured");
            self.park_in_error(&mut document, "issuing company profile not found").await?;
            summary.failed += 1;
            return Ok(());
        };

        // Build
        let canonical =
            match self.builder.build(&document, &company, self.documents.as_ref()).await {
                Ok(canonical) => canonical,
                Err(BuildError::Store(e)) => {
                    // Infrastructure fault, not a data problem: release the
                    // claim so the next cycle retries the build.
                    document.status = DocumentStatus::Pending;
                    self.documents.update(&document).await?;
                    return Err(e);
                }
                Err(e) => {
                    warn!(document_id = %document.id, error = %e, "build failed");
                    self.park_in_error(&mut document, &e.to_string()).await?;
                    summary.failed += 1;
                    return Ok(());
                }
            };

        // The cancel check runs before the row is written again: a full-row
        // update after the check would overwrite an operator's cancel.
        if self.operator_cancelled(&document.id).await? {
            debug!(document_id = %document.id, "document cancelled before signing");
            return Ok(());
        }

        document.cdc = Some(canonical.cdc.clone());
        document.security_code = Some(canonical.security_code.clone());
        document.payload_json = Some(canonical.to_payload_json()?);
        self.documents.update(&document).await?;

        // Sign
        let signed = match self.signer.sign(&canonical, &company).await {
            Ok(signed) => signed,
            Err(e) if e.is_permanent() => {
                warn!(document_id = %document.id, error = %e, "signing failed permanently");
                self.park_in_error(&mut document, &e.to_string()).await?;
                summary.failed += 1;
                return Ok(());
            }
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "signing failed, will retry");
                self.retryable_failure(&mut document, &e.to_string(), config).await?;
                summary.failed += 1;
                return Ok(());
            }
        };

        if self.operator_cancelled(&document.id).await? {
            debug!(document_id = %document.id, "document cancelled before submission");
            return Ok(());
        }

        document.signed_payload = Some(signed.to_artifact_json()?);
        document.qr_url = Some(signed.qr_url.clone());
        document.status = DocumentStatus::Signed;
        self.documents.update(&document).await?;

        // Submit. Persist `Submitted` before the network call: if the
        // process dies mid-exchange, the next cycle reconciles through the
        // status query instead of blindly submitting again.
        document.status = DocumentStatus::Submitted;
        document.last_attempt_at = Some(Utc::now().timestamp());
        self.documents.update(&document).await?;

        let request = SubmissionRequest {
            company: company.clone(),
            canonical: canonical.clone(),
            signed,
        };
        let outcome = match self.transport.submit(&request).await {
            Ok(outcome) => outcome,
            Err(e) => SubmissionOutcome::Transient { reason: e.to_string() },
        };

        match outcome {
            SubmissionOutcome::Accepted { protocol_number } => {
                info!(document_id = %document.id, protocol = %protocol_number, "document accepted");
                document.status = DocumentStatus::Accepted;
                document.protocol_number = Some(protocol_number);
                document.last_error = None;
                summary.succeeded += 1;
            }
            SubmissionOutcome::Queued { batch_id } => {
                debug!(document_id = %document.id, batch_id = ?batch_id, "document queued at authority");
                document.status = DocumentStatus::Submitted;
                document.last_error = None;
                summary.succeeded += 1;
            }
            SubmissionOutcome::Rejected { code, message } => {
                warn!(document_id = %document.id, code = %code, "document rejected by authority");
                document.status = DocumentStatus::Rejected;
                document.attempts += 1;
                document.last_error = Some(truncate_reason(&format!("{code}: {message}")));
                summary.failed += 1;
            }
            SubmissionOutcome::Transient { reason } => {
                warn!(document_id = %document.id, reason = %reason, "transient submission failure");
                self.apply_retry_policy(&mut document, &reason, config);
                summary.failed += 1;
            }
            SubmissionOutcome::Unknown { reason } => {
                warn!(document_id = %document.id, reason = %reason, "ambiguous submission response");
                // Stay in Submitted; the next cycle resolves it through
                // query_status before any further submit attempt.
                document.status = DocumentStatus::Submitted;
                document.last_error = Some(truncate_reason(&reason));
                summary.failed += 1;
            }
        }

        self.documents.update(&document).await
    }

    /// Resolve the verdict of a previously submitted document.
    #[instrument(skip(self, document, config, summary), fields(document_id = %document.id))]
    async fn reconcile_document(
        &self,
        mut document: FiscalDocument,
        config: &SubmissionCycleConfig,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let Some(company) = self.companies.get(&document.company_id).await? else {
            self.park_in_error(&mut document, "issuing company profile not found").await?;
            return Ok(());
        };
        let Some(cdc) = document.cdc.clone() else {
            // A submitted row without a CDC cannot be queried; rebuild it.
            self.retryable_failure(&mut document, "submitted without CDC", config).await?;
            return Ok(());
        };

        let report = match self.transport.query_status(&company, &cdc).await {
            Ok(report) => report,
            Err(e) => StatusReport::Unavailable { reason: e.to_string() },
        };

        match report {
            StatusReport::Accepted { protocol_number } => {
                info!(document_id = %document.id, "query confirmed acceptance");
                document.status = DocumentStatus::Accepted;
                document.protocol_number = protocol_number.or(document.protocol_number.take());
                document.last_error = None;
                summary.reconciled += 1;
                self.documents.update(&document).await
            }
            StatusReport::Rejected { code, message } => {
                warn!(document_id = %document.id, code = %code, "query confirmed rejection");
                document.status = DocumentStatus::Rejected;
                document.last_error = Some(truncate_reason(&format!("{code}: {message}")));
                summary.reconciled += 1;
                self.documents.update(&document).await
            }
            StatusReport::NotFound => {
                // The authority never saw the document: resubmitting cannot
                // duplicate it.
                debug!(document_id = %document.id, "authority has no record, rescheduling");
                self.retryable_failure(&mut document, "authority has no record of submission", config)
                    .await?;
                summary.reconciled += 1;
                Ok(())
            }
            StatusReport::InProcess => {
                debug!(document_id = %document.id, "authority still processing");
                Ok(())
            }
            StatusReport::Unavailable { reason } => {
                debug!(document_id = %document.id, reason = %reason, "status query unavailable");
                Ok(())
            }
        }
    }

    /// Apply the retry policy to an in-memory document (no persistence).
    fn apply_retry_policy(
        &self,
        document: &mut FiscalDocument,
        reason: &str,
        config: &SubmissionCycleConfig,
    ) {
        document.attempts += 1;
        document.last_error = Some(truncate_reason(reason));
        document.last_attempt_at = Some(Utc::now().timestamp());
        document.status = if document.attempts >= config.max_retries as i32 {
            DocumentStatus::Error
        } else {
            DocumentStatus::Pending
        };
    }

    /// Persisted variant of [`Self::apply_retry_policy`].
    async fn retryable_failure(
        &self,
        document: &mut FiscalDocument,
        reason: &str,
        config: &SubmissionCycleConfig,
    ) -> Result<()> {
        self.apply_retry_policy(document, reason, config);
        self.documents.update(document).await
    }

    /// Park a document in `Error`; an operator requeue is required.
    async fn park_in_error(&self, document: &mut FiscalDocument, reason: &str) -> Result<()> {
        document.attempts += 1;
        document.last_error = Some(truncate_reason(reason));
        document.last_attempt_at = Some(Utc::now().timestamp());
        document.status = DocumentStatus::Error;
        self.documents.update(document).await
    }

    /// Re-read the row to honor an operator cancel between steps.
    async fn operator_cancelled(&self, id: &str) -> Result<bool> {
        Ok(self
            .documents
            .get(id)
            .await?
            .map(|d| d.status == DocumentStatus::Cancelled)
            .unwrap_or(false))
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_ERROR_TEXT_LEN {
        return reason.to_string();
    }
    let mut truncated =
        reason.chars().take(MAX_ERROR_TEXT_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use ekuatia_domain::{
        CompanyCertificate, CompanyProfile, DocumentKind, DocumentTotals, EndpointOverrides,
        LineItem, Receiver, ReceiverNature, Result as DomainResult, SaleSnapshot, SifenEnvironment,
        SignedDocument, TaxpayerType,
    };
    use tokio::sync::Mutex as TokioMutex;

    use super::*;
    use crate::ports::{RucReport, SignError};

    // ------------------------------------------------------------------
    // Mock ports
    // ------------------------------------------------------------------

    struct MemoryStore {
        rows: TokioMutex<HashMap<String, FiscalDocument>>,
        select_calls: AtomicU32,
    }

    impl MemoryStore {
        fn with_documents(documents: Vec<FiscalDocument>) -> Arc<Self> {
            let rows = documents.into_iter().map(|d| (d.id.clone(), d)).collect();
            Arc::new(Self { rows: TokioMutex::new(rows), select_calls: AtomicU32::new(0) })
        }

        async fn row(&self, id: &str) -> FiscalDocument {
            self.rows.lock().await.get(id).cloned().expect("row exists")
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn insert(&self, document: &FiscalDocument) -> DomainResult<()> {
            self.rows.lock().await.insert(document.id.clone(), document.clone());
            Ok(())
        }

        async fn get(&self, id: &str) -> DomainResult<Option<FiscalDocument>> {
            Ok(self.rows.lock().await.get(id).cloned())
        }

        async fn select_for_cycle(&self, limit: u32) -> DomainResult<Vec<FiscalDocument>> {
            self.select_calls.fetch_add(1, Ordering::SeqCst);
            let rows = self.rows.lock().await;
            let mut selectable: Vec<_> =
                rows.values().filter(|d| d.status.is_selectable()).cloned().collect();
            selectable.sort_by_key(|d| d.created_at);
            selectable.truncate(limit as usize);
            Ok(selectable)
        }

        async fn submitted_for_reconciliation(
            &self,
            limit: u32,
        ) -> DomainResult<Vec<FiscalDocument>> {
            let rows = self.rows.lock().await;
            let mut submitted: Vec<_> = rows
                .values()
                .filter(|d| d.status == DocumentStatus::Submitted)
                .cloned()
                .collect();
            submitted.sort_by_key(|d| d.created_at);
            submitted.truncate(limit as usize);
            Ok(submitted)
        }

        async fn claim_for_processing(&self, id: &str) -> DomainResult<bool> {
            let mut rows = self.rows.lock().await;
            match rows.get_mut(id) {
                Some(row) if row.status.is_selectable() => {
                    row.status = DocumentStatus::Building;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn cdc_exists(&self, cdc: &str, excluding_id: &str) -> DomainResult<bool> {
            let rows = self.rows.lock().await;
            Ok(rows
                .values()
                .any(|d| d.id != excluding_id && d.cdc.as_deref() == Some(cdc)))
        }

        async fn update(&self, document: &FiscalDocument) -> DomainResult<()> {
            self.rows.lock().await.insert(document.id.clone(), document.clone());
            Ok(())
        }

        async fn documents_by_status(
            &self,
            status: DocumentStatus,
            limit: u32,
        ) -> DomainResult<Vec<FiscalDocument>> {
            let rows = self.rows.lock().await;
            let mut matching: Vec<_> =
                rows.values().filter(|d| d.status == status).cloned().collect();
            matching.sort_by_key(|d| std::cmp::Reverse(d.created_at));
            matching.truncate(limit as usize);
            Ok(matching)
        }
    }

    struct StaticCompanies;

    #[async_trait]
    impl CompanyStore for StaticCompanies {
        async fn get(&self, id: &str) -> DomainResult<Option<CompanyProfile>> {
            if id == "company-1" {
                Ok(Some(company()))
            } else {
                Ok(None)
            }
        }
    }

    struct StaticConfig(SubmissionCycleConfig);

    #[async_trait]
    impl ConfigStore for StaticConfig {
        async fn load(&self) -> DomainResult<SubmissionCycleConfig> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingRuns {
        records: TokioMutex<Vec<QueueRunRecord>>,
    }

    #[async_trait]
    impl QueueRunStore for RecordingRuns {
        async fn record(&self, run: &QueueRunRecord) -> DomainResult<()> {
            self.records.lock().await.push(run.clone());
            Ok(())
        }

        async fn recent(&self, limit: u32) -> DomainResult<Vec<QueueRunRecord>> {
            let records = self.records.lock().await;
            Ok(records.iter().rev().take(limit as usize).cloned().collect())
        }
    }

    struct FixedSigner {
        fail_with: Option<fn() -> SignError>,
    }

    impl FixedSigner {
        fn ok() -> Self {
            Self { fail_with: None }
        }

        fn failing(f: fn() -> SignError) -> Self {
            Self { fail_with: Some(f) }
        }
    }

    #[async_trait]
    impl DocumentSigner for FixedSigner {
        async fn sign(
            &self,
            canonical: &ekuatia_domain::CanonicalDocument,
            _company: &CompanyProfile,
        ) -> std::result::Result<SignedDocument, SignError> {
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(SignedDocument {
                algorithm: "ed25519-sha256".into(),
                digest: "ZGlnZXN0".into(),
                signature: "c2lnbmF0dXJl".into(),
                qr_url: format!("https://ekuatia.set.gov.py/consultas-test/qr?Id={}", canonical.cdc),
            })
        }
    }

    struct ScriptedTransport {
        submit_outcomes: TokioMutex<Vec<SubmissionOutcome>>,
        submit_calls: AtomicU32,
        status_reports: TokioMutex<Vec<StatusReport>>,
        status_calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(submit_outcomes: Vec<SubmissionOutcome>, status_reports: Vec<StatusReport>) -> Self {
            Self {
                submit_outcomes: TokioMutex::new(submit_outcomes),
                submit_calls: AtomicU32::new(0),
                status_reports: TokioMutex::new(status_reports),
                status_calls: AtomicU32::new(0),
            }
        }

        fn submit_count(&self) -> u32 {
            self.submit_calls.load(Ordering::SeqCst)
        }

        fn status_count(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FiscalTransport for ScriptedTransport {
        async fn submit(&self, _request: &SubmissionRequest) -> DomainResult<SubmissionOutcome> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.submit_outcomes.lock().await;
            if outcomes.is_empty() {
                Ok(SubmissionOutcome::Accepted { protocol_number: "P-0001".into() })
            } else {
                Ok(outcomes.remove(0))
            }
        }

        async fn submit_batch(
            &self,
            requests: &[SubmissionRequest],
        ) -> DomainResult<Vec<SubmissionOutcome>> {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.submit(request).await?);
            }
            Ok(results)
        }

        async fn query_status(
            &self,
            _company: &CompanyProfile,
            _cdc: &str,
        ) -> DomainResult<StatusReport> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut reports = self.status_reports.lock().await;
            if reports.is_empty() {
                Ok(StatusReport::InProcess)
            } else {
                Ok(reports.remove(0))
            }
        }

        async fn query_ruc(
            &self,
            _company: &CompanyProfile,
            ruc: &str,
        ) -> DomainResult<RucReport> {
            Ok(RucReport { ruc: ruc.to_string(), name: None, active: true })
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    fn company() -> CompanyProfile {
        CompanyProfile {
            id: "company-1".into(),
            name: "DISTRIBUIDORA GUARANI S.R.L.".into(),
            ruc: "80012345".into(),
            ruc_dv: 7,
            taxpayer_type: TaxpayerType::Juridical,
            environment: SifenEnvironment::Test,
            certificate: CompanyCertificate {
                key_path: "/tmp/test.key".into(),
                password: "secret".into(),
            },
            csc_id: "1".into(),
            csc: "ABCD0000000000000000000000000000".into(),
            endpoints: EndpointOverrides::default(),
        }
    }

    fn snapshot_json() -> String {
        let snapshot = SaleSnapshot {
            receiver: Receiver {
                name: "COMERCIAL DEL ESTE S.A.".into(),
                nature: ReceiverNature::Taxpayer,
                ruc: Some("80099999-2".into()),
                id_kind: None,
                id_number: None,
            },
            currency: "PYG".into(),
            items: vec![LineItem {
                description: "Servicio mensual".into(),
                quantity: 1.0,
                unit_price: 150_000,
                line_total: 150_000,
                vat_amount: 13_636,
            }],
            totals: DocumentTotals { total: 150_000, vat_total: 13_636 },
        };
        serde_json::to_string(&snapshot).unwrap()
    }

    fn pending_document(id: &str, number: u32, created_at: i64) -> FiscalDocument {
        FiscalDocument {
            id: id.into(),
            source_id: format!("sale-{number}"),
            company_id: "company-1".into(),
            kind: DocumentKind::Invoice,
            timbrado: "12345678".into(),
            establishment: "001".into(),
            point_of_sale: "003".into(),
            series: None,
            number,
            snapshot_json: Some(snapshot_json()),
            cdc: None,
            security_code: None,
            payload_json: None,
            signed_payload: None,
            qr_url: None,
            protocol_number: None,
            status: DocumentStatus::Pending,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            issued_at: created_at,
            created_at,
            updated_at: None,
        }
    }

    fn default_config() -> SubmissionCycleConfig {
        SubmissionCycleConfig {
            active: true,
            interval_minutes: 2,
            max_documents_per_cycle: 10,
            max_retries: 3,
        }
    }

    fn service(
        store: Arc<MemoryStore>,
        config: SubmissionCycleConfig,
        signer: FixedSigner,
        transport: Arc<ScriptedTransport>,
        runs: Arc<RecordingRuns>,
    ) -> SubmissionService {
        SubmissionService::new(
            store,
            Arc::new(StaticCompanies),
            Arc::new(StaticConfig(config)),
            runs,
            Arc::new(signer),
            transport,
        )
    }

    // ------------------------------------------------------------------
    // Cycle behaviour
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn inactive_cycle_records_run_and_touches_nothing() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));
        let mut config = default_config();
        config.active = false;

        let service = service(store.clone(), config, FixedSigner::ok(), transport.clone(), runs.clone());
        let summary = service.run_cycle().await.expect("cycle succeeds");

        assert!(!summary.active);
        assert_eq!(summary.attempted, 0);
        assert_eq!(transport.submit_count(), 0);
        assert_eq!(store.select_calls.load(Ordering::SeqCst), 0);

        let records = runs.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attempted, 0);

        // The pending document is untouched.
        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Pending);
        assert_eq!(row.attempts, 0);
    }

    #[tokio::test]
    async fn accepted_document_reaches_terminal_state() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Accepted { protocol_number: "P-7781".into() }],
            vec![],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);
        let summary = service.run_cycle().await.expect("cycle succeeds");

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Accepted);
        assert_eq!(row.protocol_number.as_deref(), Some("P-7781"));
        assert!(row.qr_url.as_deref().unwrap_or_default().contains("Id="));
        assert!(row.cdc.is_some());

        // Terminal documents are never re-selected.
        let second = service.run_cycle().await.expect("second cycle succeeds");
        assert_eq!(second.attempted, 0);
        assert_eq!(transport.submit_count(), 1);
    }

    #[tokio::test]
    async fn transient_failure_returns_document_to_pending() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Transient { reason: "connect timeout".into() }],
            vec![],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport, runs);
        let summary = service.run_cycle().await.expect("cycle succeeds");

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.failed, 1);

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Pending);
        assert_eq!(row.attempts, 1);
        assert_eq!(row.last_error.as_deref(), Some("connect timeout"));
    }

    #[tokio::test]
    async fn retries_exhausted_parks_document_in_error() {
        let mut document = pending_document("doc-1", 1, 1_750_000_000);
        document.attempts = 2; // max_retries - 1
        let store = MemoryStore::with_documents(vec![document]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Transient { reason: "503 service unavailable".into() }],
            vec![],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);
        service.run_cycle().await.expect("cycle succeeds");

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Error);
        assert_eq!(row.attempts, 3);

        // Parked documents stay parked.
        let second = service.run_cycle().await.expect("second cycle succeeds");
        assert_eq!(second.attempted, 0);
        assert_eq!(transport.submit_count(), 1);
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Rejected {
                code: "0160".into(),
                message: "XML mal formado".into(),
            }],
            vec![],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport, runs);
        service.run_cycle().await.expect("cycle succeeds");

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Rejected);
        assert!(row.last_error.as_deref().unwrap_or_default().starts_with("0160"));
    }

    #[tokio::test]
    async fn unknown_response_is_reconciled_before_any_resubmit() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Unknown { reason: "empty response body".into() }],
            vec![StatusReport::Accepted { protocol_number: Some("P-9000".into()) }],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);

        // Cycle 1: submit returns an ambiguous response.
        service.run_cycle().await.expect("first cycle succeeds");
        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Submitted);
        assert_eq!(transport.submit_count(), 1);

        // Cycle 2: the verdict is resolved through the status query, with no
        // duplicate submission.
        let second = service.run_cycle().await.expect("second cycle succeeds");
        assert_eq!(second.reconciled, 1);
        assert_eq!(transport.submit_count(), 1);
        assert_eq!(transport.status_count(), 1);

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Accepted);
        assert_eq!(row.protocol_number.as_deref(), Some("P-9000"));
    }

    #[tokio::test]
    async fn not_found_on_reconciliation_reschedules_submission() {
        // Numbering and issue date chosen so the stored CDC derives from the
        // row fields (number 123, issued 2026-03-15).
        let mut document = pending_document("doc-1", 123, 1_773_570_600);
        document.status = DocumentStatus::Submitted;
        document.cdc = Some("01800123457001003000012322026031511234567895".into());
        document.security_code = Some("123456789".into());
        let store = MemoryStore::with_documents(vec![document]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![SubmissionOutcome::Accepted { protocol_number: "P-1".into() }],
            vec![StatusReport::NotFound],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);
        let summary = service.run_cycle().await.expect("cycle succeeds");

        // Reconciliation returned the document to the queue, and the same
        // cycle resubmitted it with the stored CDC.
        assert_eq!(summary.reconciled, 1);
        assert_eq!(transport.status_count(), 1);
        assert_eq!(transport.submit_count(), 1);

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Accepted);
        assert_eq!(row.attempts, 1);
        assert_eq!(row.cdc.as_deref(), Some("01800123457001003000012322026031511234567895"));
    }

    #[tokio::test]
    async fn permanent_sign_failure_parks_document() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));

        let service = service(
            store.clone(),
            default_config(),
            FixedSigner::failing(|| SignError::CertificateExpired("company-1".into())),
            transport.clone(),
            runs,
        );
        service.run_cycle().await.expect("cycle succeeds");

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Error);
        assert_eq!(row.attempts, 1);
        assert_eq!(transport.submit_count(), 0);
    }

    #[tokio::test]
    async fn transient_sign_failure_is_retryable() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));

        let service = service(
            store.clone(),
            default_config(),
            FixedSigner::failing(|| SignError::CryptoFailure("token busy".into())),
            transport,
            runs,
        );
        service.run_cycle().await.expect("cycle succeeds");

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Pending);
        assert_eq!(row.attempts, 1);
    }

    #[tokio::test]
    async fn build_failure_is_permanent() {
        let mut document = pending_document("doc-1", 1, 1_750_000_000);
        document.snapshot_json = None;
        let store = MemoryStore::with_documents(vec![document]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);
        service.run_cycle().await.expect("cycle succeeds");

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Error);
        assert_eq!(row.attempts, 1);
        assert!(row.last_error.as_deref().unwrap_or_default().contains("snapshot"));
        assert_eq!(transport.submit_count(), 0);
    }

    #[tokio::test]
    async fn selection_respects_cycle_cap_and_fifo_order() {
        let documents = vec![
            pending_document("doc-3", 3, 1_750_000_300),
            pending_document("doc-1", 1, 1_750_000_100),
            pending_document("doc-2", 2, 1_750_000_200),
        ];
        let store = MemoryStore::with_documents(documents);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));
        let mut config = default_config();
        config.max_documents_per_cycle = 2;

        let service = service(store.clone(), config, FixedSigner::ok(), transport.clone(), runs);
        let summary = service.run_cycle().await.expect("cycle succeeds");

        // Oldest two processed; the newest waits for the next cycle.
        assert_eq!(summary.attempted, 2);
        assert_eq!(store.row("doc-1").await.status, DocumentStatus::Accepted);
        assert_eq!(store.row("doc-2").await.status, DocumentStatus::Accepted);
        assert_eq!(store.row("doc-3").await.status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn attempts_never_exceed_max_retries() {
        let store =
            MemoryStore::with_documents(vec![pending_document("doc-1", 1, 1_750_000_000)]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                SubmissionOutcome::Transient { reason: "t1".into() },
                SubmissionOutcome::Transient { reason: "t2".into() },
                SubmissionOutcome::Transient { reason: "t3".into() },
                SubmissionOutcome::Transient { reason: "t4".into() },
            ],
            vec![],
        ));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);

        for _ in 0..5 {
            service.run_cycle().await.expect("cycle succeeds");
        }

        let row = store.row("doc-1").await;
        assert_eq!(row.status, DocumentStatus::Error);
        assert_eq!(row.attempts, 3);
        // Three submit attempts, then the document was parked.
        assert_eq!(transport.submit_count(), 3);
    }

    #[tokio::test]
    async fn cancelled_document_is_skipped() {
        let mut document = pending_document("doc-1", 1, 1_750_000_000);
        document.status = DocumentStatus::Cancelled;
        let store = MemoryStore::with_documents(vec![document]);
        let runs = Arc::new(RecordingRuns::default());
        let transport = Arc::new(ScriptedTransport::new(vec![], vec![]));

        let service =
            service(store.clone(), default_config(), FixedSigner::ok(), transport.clone(), runs);
        let summary = service.run_cycle().await.expect("cycle succeeds");

        assert_eq!(summary.attempted, 0);
        assert_eq!(transport.submit_count(), 0);
        assert_eq!(store.row("doc-1").await.status, DocumentStatus::Cancelled);
    }

    #[test]
    fn truncate_reason_bounds_error_text() {
        let long = "x".repeat(MAX_ERROR_TEXT_LEN * 2);
        let truncated = truncate_reason(&long);
        assert_eq!(truncated.len(), MAX_ERROR_TEXT_LEN);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_reason("short"), "short");
    }
}
