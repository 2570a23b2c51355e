//! Issuing-company (Sociedad) types
//!
//! Each company owns a signing certificate, a contributor security code for
//! QR hashing, and the set of authority endpoints it submits to. Endpoint
//! URLs may be overridden per company; otherwise they derive from the
//! configured environment.

use serde::{Deserialize, Serialize};

use crate::constants::{
    QR_PROD_BASE, QR_TEST_BASE, QUERY_DOCUMENT_PATH, QUERY_RUC_PATH, SIFEN_PROD_BASE,
    SIFEN_TEST_BASE, SUBMIT_BATCH_PATH, SUBMIT_PATH,
};

/// Authority environment a company submits against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SifenEnvironment {
    Test,
    Prod,
}

crate::impl_status_conversions!(SifenEnvironment {
    Test => "test",
    Prod => "prod",
});

impl SifenEnvironment {
    fn service_base(self) -> &'static str {
        match self {
            Self::Test => SIFEN_TEST_BASE,
            Self::Prod => SIFEN_PROD_BASE,
        }
    }

    fn qr_base(self) -> &'static str {
        match self {
            Self::Test => QR_TEST_BASE,
            Self::Prod => QR_PROD_BASE,
        }
    }
}

/// Taxpayer type of the issuer (SIFEN field `iTipCont`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerType {
    /// Natural person (code 1)
    Natural,
    /// Juridical person (code 2)
    Juridical,
}

impl TaxpayerType {
    pub fn code(self) -> u8 {
        match self {
            Self::Natural => 1,
            Self::Juridical => 2,
        }
    }
}

/// Signing-certificate configuration for a company.
///
/// The password is deliberately excluded from `Debug` output; it must never
/// reach logs or error text.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCertificate {
    /// Filesystem path of the key material.
    pub key_path: String,
    pub password: String,
}

impl std::fmt::Debug for CompanyCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanyCertificate")
            .field("key_path", &self.key_path)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-company endpoint overrides; `None` falls back to the environment
/// default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverrides {
    pub submit: Option<String>,
    pub submit_batch: Option<String>,
    pub query_document: Option<String>,
    pub query_ruc: Option<String>,
    pub qr_base: Option<String>,
}

/// Issuing company configuration, read-only during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: String,
    pub name: String,
    /// Issuer RUC without check digit.
    pub ruc: String,
    /// RUC check digit.
    pub ruc_dv: u8,
    pub taxpayer_type: TaxpayerType,
    pub environment: SifenEnvironment,
    pub certificate: CompanyCertificate,
    /// Contributor security code id (`IdCSC`).
    pub csc_id: String,
    /// Contributor security code used for QR hashing.
    pub csc: String,
    #[serde(default)]
    pub endpoints: EndpointOverrides,
}

impl CompanyProfile {
    pub fn submit_url(&self) -> String {
        self.endpoints
            .submit
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.environment.service_base(), SUBMIT_PATH))
    }

    pub fn submit_batch_url(&self) -> String {
        self.endpoints
            .submit_batch
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.environment.service_base(), SUBMIT_BATCH_PATH))
    }

    pub fn query_document_url(&self) -> String {
        self.endpoints.query_document.clone().unwrap_or_else(|| {
            format!("{}{}", self.environment.service_base(), QUERY_DOCUMENT_PATH)
        })
    }

    pub fn query_ruc_url(&self) -> String {
        self.endpoints
            .query_ruc
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.environment.service_base(), QUERY_RUC_PATH))
    }

    pub fn qr_base_url(&self) -> String {
        self.endpoints.qr_base.clone().unwrap_or_else(|| self.environment.qr_base().to_string())
    }
}
