//! # Ekuatia Infrastructure
//!
//! Infrastructure implementations of the core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite via r2d2-pooled rusqlite)
//! - The authority transport client (reqwest)
//! - The certificate store and document signer
//! - The cycle scheduler with explicit lifecycle management
//! - The process configuration loader
//!
//! ## Architecture
//! - Implements traits defined in `ekuatia-core`
//! - Depends on `ekuatia-domain` and `ekuatia-core`
//! - Contains all "impure" code (I/O, crypto, clocks)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod scheduling;
pub mod sign;
pub mod transport;

pub use errors::InfraError;
