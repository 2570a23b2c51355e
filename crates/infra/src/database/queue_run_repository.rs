//! SQLite-backed implementation of the queue-run store port.

use std::sync::Arc;

use async_trait::async_trait;
use ekuatia_core::QueueRunStore;
use ekuatia_domain::{QueueRunRecord, Result};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

/// SQLite-backed queue-run repository.
pub struct SqliteQueueRunRepository {
    db: Arc<DbManager>,
}

impl SqliteQueueRunRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QueueRunStore for SqliteQueueRunRepository {
    async fn record(&self, run: &QueueRunRecord) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_insert = run.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT OR REPLACE INTO queue_runs
                    (id, started_at, finished_at, attempted, succeeded, failed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    to_insert.id,
                    to_insert.started_at,
                    to_insert.finished_at,
                    i64::from(to_insert.attempted),
                    i64::from(to_insert.succeeded),
                    i64::from(to_insert.failed),
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recent(&self, limit: u32) -> Result<Vec<QueueRunRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<QueueRunRecord>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, started_at, finished_at, attempted, succeeded, failed
                     FROM queue_runs
                     ORDER BY started_at DESC
                     LIMIT ?1",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![i64::from(limit)], map_run_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<QueueRunRecord> {
    Ok(QueueRunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        attempted: row.get::<_, i64>(3)?.max(0) as u32,
        succeeded: row.get::<_, i64>(4)?.max(0) as u32,
        failed: row.get::<_, i64>(5)?.max(0) as u32,
    })
}
