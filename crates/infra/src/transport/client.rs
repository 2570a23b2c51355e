//! Authority client for document submission and status queries.
//!
//! Speaks JSON to the SIFEN facade endpoints configured per company. Every
//! call is wrapped in the configured timeout and classified into the
//! outcome types the queue manager branches on; nothing here retries.
//!
//! Classification follows the authority's response catalog: 0260/0302
//! confirm acceptance, 0300/0301 acknowledge batch reception, 0160 is a
//! definitive rejection (malformed document). Anything ambiguous maps to
//! `Unknown` so the queue manager reconciles through the status query
//! instead of submitting twice.

use std::time::Duration;

use async_trait::async_trait;
use ekuatia_core::{
    FiscalTransport, RucReport, StatusReport, SubmissionOutcome, SubmissionRequest,
};
use ekuatia_domain::{CompanyProfile, EkuatiaError, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::errors::TransportError;
use crate::http::HttpClient;

/// Configuration for the authority client.
#[derive(Debug, Clone)]
pub struct SifenClientConfig {
    /// Timeout for authority requests.
    pub timeout: Duration,
    /// User agent reported to the authority facade.
    pub user_agent: String,
}

impl Default for SifenClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: "ekuatia-pipeline/0.1".to_string() }
    }
}

/// Authority client for submit / batch / query exchanges.
pub struct SifenClient {
    http: HttpClient,
    config: SifenClientConfig,
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    cdc: &'a str,
    #[serde(rename = "documento")]
    document: &'a ekuatia_domain::CanonicalDocument,
    #[serde(rename = "firma")]
    signature: SignatureBody<'a>,
}

#[derive(Debug, Serialize)]
struct SignatureBody<'a> {
    #[serde(rename = "algoritmo")]
    algorithm: &'a str,
    #[serde(rename = "digestValue")]
    digest: &'a str,
    #[serde(rename = "valor")]
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchBody<'a> {
    #[serde(rename = "documentos")]
    documents: Vec<SubmitBody<'a>>,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    cdc: &'a str,
}

#[derive(Debug, Serialize)]
struct RucQueryBody<'a> {
    ruc: &'a str,
}

/// Response shape of the authority facade: the JSON rendering of the SOAP
/// envelope fields the gateway extracts.
#[derive(Debug, Default, Deserialize)]
struct AuthorityResponse {
    #[serde(rename = "codigo")]
    code: Option<String>,
    #[serde(rename = "mensaje")]
    message: Option<String>,
    #[serde(rename = "estado")]
    state: Option<String>,
    #[serde(rename = "protocolo")]
    protocol_number: Option<String>,
    #[serde(rename = "idLote")]
    batch_id: Option<String>,
    #[serde(rename = "razonSocial")]
    registered_name: Option<String>,
    #[serde(rename = "activo")]
    active: Option<bool>,
}

impl SifenClient {
    /// Create a new client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(SifenClientConfig::default())
    }

    /// Create a new client with custom configuration.
    pub fn with_config(config: SifenClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> std::result::Result<(u16, String), TransportError> {
        let builder = self
            .http
            .request(Method::POST, url)
            .header("Content-Type", "application/json")
            .json(body);

        let response = tokio::time::timeout(self.config.timeout, self.http.send(builder))
            .await
            .map_err(|_| TransportError::Timeout(self.config.timeout))?
            .map_err(|e| match e {
                EkuatiaError::Network(message) => TransportError::Network(message),
                EkuatiaError::Config(message) => TransportError::Config(message),
                other => TransportError::Network(other.to_string()),
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("body read failed: {e}")))?;
        Ok((status, text))
    }
}

#[async_trait]
impl FiscalTransport for SifenClient {
    #[instrument(skip(self, request), fields(cdc = %request.canonical.cdc))]
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        let url = request.company.submit_url();
        let body = SubmitBody {
            cdc: &request.canonical.cdc,
            document: &request.canonical,
            signature: SignatureBody {
                algorithm: &request.signed.algorithm,
                digest: &request.signed.digest,
                value: &request.signed.signature,
            },
        };

        debug!(url = %url, "submitting document");

        match self.post_json(&url, &body).await {
            Ok((status, text)) => {
                let outcome = classify_submission_response(status, &text);
                debug!(status = status, outcome = ?outcome, "submission classified");
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "submission exchange failed");
                Ok(exchange_failure_outcome(&e))
            }
        }
    }

    #[instrument(skip(self, requests), fields(count = requests.len()))]
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> Result<Vec<SubmissionOutcome>> {
        let Some(first) = requests.first() else {
            return Ok(Vec::new());
        };
        let url = first.company.submit_batch_url();

        let documents = requests
            .iter()
            .map(|request| SubmitBody {
                cdc: &request.canonical.cdc,
                document: &request.canonical,
                signature: SignatureBody {
                    algorithm: &request.signed.algorithm,
                    digest: &request.signed.digest,
                    value: &request.signed.signature,
                },
            })
            .collect();
        let body = BatchBody { documents };

        debug!(url = %url, "submitting batch");

        // The batch endpoint acknowledges the lot as a whole; every document
        // shares the classification until the status query resolves it.
        let outcome = match self.post_json(&url, &body).await {
            Ok((status, text)) => classify_submission_response(status, &text),
            Err(e) => exchange_failure_outcome(&e),
        };

        if matches!(outcome, SubmissionOutcome::Queued { .. }) {
            info!(count = requests.len(), "batch acknowledged by authority");
        }

        Ok(vec![outcome; requests.len()])
    }

    #[instrument(skip(self, company))]
    async fn query_status(&self, company: &CompanyProfile, cdc: &str) -> Result<StatusReport> {
        let url = company.query_document_url();
        let body = QueryBody { cdc };

        match self.post_json(&url, &body).await {
            Ok((status, text)) => Ok(classify_status_response(status, &text)),
            Err(e) => Ok(StatusReport::Unavailable { reason: e.to_string() }),
        }
    }

    #[instrument(skip(self, company))]
    async fn query_ruc(&self, company: &CompanyProfile, ruc: &str) -> Result<RucReport> {
        let url = company.query_ruc_url();
        let body = RucQueryBody { ruc };

        let (status, text) =
            self.post_json(&url, &body).await.map_err(|e| EkuatiaError::Network(e.to_string()))?;

        if status >= 400 {
            return Err(EkuatiaError::Network(format!("RUC query returned HTTP {status}")));
        }

        let response: AuthorityResponse = serde_json::from_str(&text)
            .map_err(|e| EkuatiaError::Network(format!("RUC query response: {e}")))?;

        Ok(RucReport {
            ruc: ruc.to_string(),
            name: response.registered_name,
            active: response.active.unwrap_or(false),
        })
    }
}

/// Map an exchange-level failure to an outcome: transient categories feed
/// the retry path, everything else is reconciled before any retry.
fn exchange_failure_outcome(error: &TransportError) -> SubmissionOutcome {
    if error.is_transient() {
        SubmissionOutcome::Transient { reason: error.to_string() }
    } else {
        SubmissionOutcome::Unknown { reason: error.to_string() }
    }
}

const ACCEPTED_CODES: &[&str] = &["0260", "0302"];
const QUEUED_CODES: &[&str] = &["0300", "0301"];
const REJECTED_CODES: &[&str] = &["0160"];

/// Classify a submission response into the queue manager's outcome type.
fn classify_submission_response(status: u16, body: &str) -> SubmissionOutcome {
    if status >= 500 {
        return SubmissionOutcome::Transient { reason: format!("authority returned HTTP {status}") };
    }

    let Ok(response) = serde_json::from_str::<AuthorityResponse>(body) else {
        return SubmissionOutcome::Unknown {
            reason: format!("unparseable response (HTTP {status})"),
        };
    };

    let code = response.code.as_deref().unwrap_or_default();
    let state = response.state.as_deref().unwrap_or_default().to_lowercase();
    let message = response.message.clone().unwrap_or_default();

    if ACCEPTED_CODES.contains(&code) || state == "aceptado" {
        // Acceptance without a protocol number is not trustworthy; resolve
        // it through the status query instead of assuming success.
        return match response.protocol_number {
            Some(protocol_number) if !protocol_number.trim().is_empty() => {
                SubmissionOutcome::Accepted { protocol_number }
            }
            _ => SubmissionOutcome::Unknown {
                reason: "accepted response without protocol number".to_string(),
            },
        };
    }

    if QUEUED_CODES.contains(&code) {
        return SubmissionOutcome::Queued { batch_id: response.batch_id };
    }

    if REJECTED_CODES.contains(&code) || state == "rechazado" {
        return SubmissionOutcome::Rejected {
            code: if code.is_empty() { "rechazado".to_string() } else { code.to_string() },
            message,
        };
    }

    SubmissionOutcome::Unknown {
        reason: format!("unrecognized response (HTTP {status}, code '{code}')"),
    }
}

/// Classify a status-query response.
fn classify_status_response(status: u16, body: &str) -> StatusReport {
    if status >= 500 {
        return StatusReport::Unavailable { reason: format!("authority returned HTTP {status}") };
    }

    let Ok(response) = serde_json::from_str::<AuthorityResponse>(body) else {
        return StatusReport::Unavailable {
            reason: format!("unparseable response (HTTP {status})"),
        };
    };

    let code = response.code.as_deref().unwrap_or_default();
    let state = response.state.as_deref().unwrap_or_default().to_lowercase();

    if ACCEPTED_CODES.contains(&code) || state == "aceptado" {
        return StatusReport::Accepted { protocol_number: response.protocol_number };
    }
    if REJECTED_CODES.contains(&code) || state == "rechazado" {
        return StatusReport::Rejected {
            code: if code.is_empty() { "rechazado".to_string() } else { code.to_string() },
            message: response.message.unwrap_or_default(),
        };
    }
    if state == "en_proceso" || QUEUED_CODES.contains(&code) {
        return StatusReport::InProcess;
    }
    if state == "no_encontrado" || code == "0420" {
        return StatusReport::NotFound;
    }

    StatusReport::Unavailable {
        reason: format!("unrecognized status response (HTTP {status}, code '{code}')"),
    }
}
