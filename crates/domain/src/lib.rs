//! # Ekuatia Domain
//!
//! Business domain types and models for the SIFEN submission pipeline.
//!
//! This crate contains:
//! - Fiscal document types (FiscalDocument, DocumentStatus, Cdc, etc.)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and the receiver-identity catalog
//!
//! ## Architecture
//! - No dependencies on other workspace crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
