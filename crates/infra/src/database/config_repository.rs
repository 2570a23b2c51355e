//! SQLite-backed implementation of the cycle-config store port.
//!
//! The configuration lives in a single row; an absent row yields the
//! defaults so a fresh database starts processing without any manual setup.

use std::sync::Arc;

use async_trait::async_trait;
use ekuatia_core::ConfigStore;
use ekuatia_domain::{Result, SubmissionCycleConfig};
use rusqlite::params;
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

/// SQLite-backed configuration repository.
pub struct SqliteConfigRepository {
    db: Arc<DbManager>,
}

impl SqliteConfigRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Persist the configuration (operator path); effective next cycle.
    pub async fn save(&self, config: SubmissionCycleConfig) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT OR REPLACE INTO submission_config
                    (id, active, interval_minutes, max_documents_per_cycle, max_retries)
                 VALUES (1, ?1, ?2, ?3, ?4)",
                params![
                    i64::from(config.active),
                    i64::from(config.interval_minutes),
                    i64::from(config.max_documents_per_cycle),
                    i64::from(config.max_retries),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigRepository {
    async fn load(&self) -> Result<SubmissionCycleConfig> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<SubmissionCycleConfig> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT active, interval_minutes, max_documents_per_cycle, max_retries
                     FROM submission_config WHERE id = 1",
                )
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map([], |row| {
                    Ok(SubmissionCycleConfig {
                        active: row.get::<_, i64>(0)? != 0,
                        interval_minutes: row.get::<_, i64>(1)?.max(0) as u32,
                        max_documents_per_cycle: row.get::<_, i64>(2)?.max(0) as u32,
                        max_retries: row.get::<_, i64>(3)?.max(0) as u32,
                    })
                })
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop().unwrap_or_default())
        })
        .await
        .map_err(map_join_error)?
    }
}
