//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! pipeline.

// CDC layout (SIFEN v150): 43 payload digits plus one check digit.
pub const CDC_LEN: usize = 44;
pub const CDC_PAYLOAD_LEN: usize = 43;

/// Length of the random numeric security code embedded in the CDC.
pub const SECURITY_CODE_LEN: usize = 9;

/// QR template version reported in the verification URL.
pub const QR_VERSION: &str = "150";

// Default SIFEN endpoints per environment. Per-company overrides in
// CompanyProfile take precedence.
pub const SIFEN_TEST_BASE: &str = "https://sifen-test.set.gov.py";
pub const SIFEN_PROD_BASE: &str = "https://sifen.set.gov.py";
pub const QR_TEST_BASE: &str = "https://ekuatia.set.gov.py/consultas-test/qr";
pub const QR_PROD_BASE: &str = "https://ekuatia.set.gov.py/consultas/qr";

pub const SUBMIT_PATH: &str = "/de/ws/sync/recibe-de";
pub const SUBMIT_BATCH_PATH: &str = "/de/ws/async/recibe-lote";
pub const QUERY_DOCUMENT_PATH: &str = "/de/ws/consultas/consulta-de";
pub const QUERY_RUC_PATH: &str = "/de/ws/consultas/consulta-ruc";

// Scheduler defaults, overridden by the persisted SubmissionCycleConfig.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 2;
pub const DEFAULT_MAX_DOCUMENTS_PER_CYCLE: u32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound kept when persisting `last_error` text.
pub const MAX_ERROR_TEXT_LEN: usize = 256;
