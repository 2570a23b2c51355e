//! Queue daemon.
//!
//! Wires the SQLite repositories, signer, and authority transport into the
//! submission service and runs the scheduler until a shutdown signal
//! arrives. The sales workflow enqueues documents into the same database;
//! this process owns them from there on.

use std::sync::Arc;
use std::time::Duration;

use ekuatia_core::{CompanyStore, ConfigStore, DocumentStore, QueueRunStore, SubmissionService};
use ekuatia_infra::config;
use ekuatia_infra::database::{
    DbManager, SqliteCompanyRepository, SqliteConfigRepository, SqliteDocumentRepository,
    SqliteQueueRunRepository,
};
use ekuatia_infra::scheduling::{QueueScheduler, QueueSchedulerOptions};
use ekuatia_infra::sign::EkuatiaSigner;
use ekuatia_infra::transport::{SifenClient, SifenClientConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = config::load()?;

    let manager = Arc::new(DbManager::new(&cfg.database.path, cfg.database.pool_size)?);
    manager.run_migrations()?;

    let documents: Arc<dyn DocumentStore> =
        Arc::new(SqliteDocumentRepository::new(manager.clone()));
    let companies: Arc<dyn CompanyStore> = Arc::new(SqliteCompanyRepository::new(manager.clone()));
    let config_store: Arc<dyn ConfigStore> =
        Arc::new(SqliteConfigRepository::new(manager.clone()));
    let runs: Arc<dyn QueueRunStore> = Arc::new(SqliteQueueRunRepository::new(manager.clone()));

    let transport = Arc::new(SifenClient::with_config(SifenClientConfig {
        timeout: Duration::from_secs(cfg.transport.timeout_seconds),
        ..Default::default()
    })?);

    let service = Arc::new(SubmissionService::new(
        documents,
        companies,
        config_store.clone(),
        runs,
        Arc::new(EkuatiaSigner::new()),
        transport,
    ));

    let mut scheduler =
        QueueScheduler::new(service, config_store, QueueSchedulerOptions::default());
    scheduler.start().await?;

    info!("queue daemon running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop().await?;
    Ok(())
}
