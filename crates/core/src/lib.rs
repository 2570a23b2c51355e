//! # Ekuatia Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The document builder (CDC derivation, security codes, validation)
//! - The submission state machine (`SubmissionService`)
//! - The operator monitor surface (`MonitorService`)
//! - Port/adapter interfaces (traits) for storage, signing, and transport
//!
//! ## Architecture Principles
//! - Only depends on `ekuatia-domain`
//! - No database, HTTP, or crypto code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod build;
pub mod monitor;
pub mod ports;
pub mod submission;

// Re-export specific items to avoid ambiguity
pub use build::cdc;
pub use build::{BuildError, DocumentBuilder};
pub use monitor::MonitorService;
pub use ports::{
    CompanyStore, ConfigStore, DocumentSigner, DocumentStore, FiscalTransport, QueueRunStore,
    RucReport, SignError, StatusReport, SubmissionOutcome, SubmissionRequest,
};
pub use submission::{CycleSummary, SubmissionService};
