//! Database adapters for the core storage ports

mod company_repository;
mod config_repository;
mod document_repository;
mod manager;
mod queue_run_repository;

pub use company_repository::SqliteCompanyRepository;
pub use config_repository::SqliteConfigRepository;
pub use document_repository::SqliteDocumentRepository;
pub use manager::{DbConnection, DbManager};
pub use queue_run_repository::SqliteQueueRunRepository;
