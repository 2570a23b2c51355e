//! Document builder
//!
//! Turns a pending fiscal-document row plus its source snapshot into the
//! canonical representation that gets signed and transmitted. Build failures
//! are always permanent data problems; there is no transient branch here.

pub mod cdc;

use ekuatia_domain::{
    CanonicalDocument, CompanyProfile, EkuatiaError, FiscalDocument, SaleSnapshot,
};
use thiserror::Error;
use tracing::debug;

use crate::ports::DocumentStore;
use self::cdc::{CdcInput, EMISSION_NORMAL};

/// Builder failures, all permanent.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The derived CDC is already assigned to another document.
    #[error("duplicate CDC: {0}")]
    DuplicateCdc(String),

    /// Required fields are missing or inconsistent.
    #[error("invalid document data: {0}")]
    InvalidData(String),

    /// The store could not be consulted for collision detection.
    #[error(transparent)]
    Store(#[from] EkuatiaError),
}

/// Canonical-document builder.
///
/// Stateless; the CDC and security code are pure functions of the document
/// fields, so rebuilding a document after a crash or transient failure
/// reproduces the stored values instead of issuing new ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the canonical representation of `document`.
    ///
    /// Reuses the stored security code and CDC when present; a freshly
    /// derived CDC is checked against already-issued documents before it is
    /// accepted.
    pub async fn build(
        &self,
        document: &FiscalDocument,
        company: &CompanyProfile,
        store: &dyn DocumentStore,
    ) -> Result<CanonicalDocument, BuildError> {
        let snapshot = self.parse_snapshot(document)?;
        self.validate(document, company, &snapshot)?;

        // First build generates the security code; every later build reuses
        // it so the document keeps a single identity across retries.
        let security_code = match &document.security_code {
            Some(code) => code.clone(),
            None => cdc::generate_security_code(),
        };

        let issue_date = document
            .issue_date()
            .ok_or_else(|| BuildError::InvalidData("issue timestamp out of range".into()))?;

        let derived = cdc::generate(&CdcInput {
            document_type: document.kind.catalog_code(),
            issuer_ruc: &company.ruc,
            ruc_dv: company.ruc_dv,
            establishment: &document.establishment,
            point_of_sale: &document.point_of_sale,
            number: document.number,
            taxpayer_type: company.taxpayer_type.code(),
            issue_date,
            emission_type: EMISSION_NORMAL,
            security_code: &security_code,
        });

        match &document.cdc {
            Some(existing) if *existing != derived => {
                // A stored CDC that no longer derives from the row means the
                // numbering fields were edited after issuance.
                return Err(BuildError::InvalidData(format!(
                    "stored CDC {existing} does not match document fields"
                )));
            }
            Some(_) => {
                debug!(document_id = %document.id, "reusing stored CDC");
            }
            None => {
                if store.cdc_exists(&derived, &document.id).await? {
                    return Err(BuildError::DuplicateCdc(derived));
                }
            }
        }

        let issued_at = document
            .issued_at_utc()
            .ok_or_else(|| BuildError::InvalidData("issue timestamp out of range".into()))?
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();

        Ok(CanonicalDocument {
            cdc: derived,
            security_code,
            kind: document.kind,
            issuer_ruc: company.ruc.clone(),
            issuer_ruc_dv: company.ruc_dv,
            number: document.document_number(),
            issued_at,
            receiver: snapshot.receiver,
            currency: snapshot.currency,
            items: snapshot.items,
            totals: snapshot.totals,
        })
    }

    fn parse_snapshot(&self, document: &FiscalDocument) -> Result<SaleSnapshot, BuildError> {
        let json = document
            .snapshot_json
            .as_deref()
            .ok_or_else(|| BuildError::InvalidData("document has no source snapshot".into()))?;
        SaleSnapshot::from_json(json).map_err(|e| BuildError::InvalidData(e.to_string()))
    }

    fn validate(
        &self,
        document: &FiscalDocument,
        company: &CompanyProfile,
        snapshot: &SaleSnapshot,
    ) -> Result<(), BuildError> {
        if company.ruc.trim().is_empty() || !company.ruc.chars().any(|c| c.is_ascii_digit()) {
            return Err(BuildError::InvalidData("issuer RUC is missing".into()));
        }
        if document.timbrado.trim().is_empty() {
            return Err(BuildError::InvalidData("timbrado is missing".into()));
        }
        if document.number == 0 {
            return Err(BuildError::InvalidData("document number is zero".into()));
        }
        if snapshot.currency.trim().is_empty() {
            return Err(BuildError::InvalidData("currency is missing".into()));
        }
        if snapshot.items.is_empty() {
            return Err(BuildError::InvalidData("document has no line items".into()));
        }
        snapshot.receiver.validate().map_err(BuildError::InvalidData)?;
        Ok(())
    }
}
