//! SQLite-backed implementation of the fiscal-document store port.
//!
//! All calls run on the blocking pool around a pooled connection. The claim
//! path is the optimistic gate that keeps two cycle instances from
//! processing the same row: the `UPDATE` only succeeds while the row is
//! still in a selectable state. Rows left in `building` by a crashed
//! process become selectable again once their claim goes stale.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ekuatia_core::DocumentStore;
use ekuatia_domain::{DocumentStatus, EkuatiaError, FiscalDocument, Result};
use rusqlite::{params, Row, ToSql};
use tokio::task;
use tracing::warn;

use super::manager::{map_join_error, map_sql_error, DbManager};

/// Seconds after which a `building` claim is considered abandoned.
const STALE_CLAIM_SECS: i64 = 900;

/// SQLite-backed fiscal-document repository.
pub struct SqliteDocumentRepository {
    db: Arc<DbManager>,
}

impl SqliteDocumentRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentRepository {
    async fn insert(&self, document: &FiscalDocument) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_insert = document.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 23] = [
                &to_insert.id,
                &to_insert.source_id,
                &to_insert.company_id,
                &to_insert.kind.to_string(),
                &to_insert.timbrado,
                &to_insert.establishment,
                &to_insert.point_of_sale,
                &to_insert.series,
                &i64::from(to_insert.number),
                &to_insert.snapshot_json,
                &to_insert.cdc,
                &to_insert.security_code,
                &to_insert.payload_json,
                &to_insert.signed_payload,
                &to_insert.qr_url,
                &to_insert.protocol_number,
                &to_insert.status.to_string(),
                &to_insert.attempts,
                &to_insert.last_error,
                &to_insert.last_attempt_at,
                &to_insert.issued_at,
                &to_insert.created_at,
                &to_insert.updated_at,
            ];
            conn.execute(DOCUMENT_INSERT_SQL, params.as_slice()).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, id: &str) -> Result<Option<FiscalDocument>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<FiscalDocument>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1"))
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![id], map_document_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn select_for_cycle(&self, limit: u32) -> Result<Vec<FiscalDocument>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<FiscalDocument>> {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let conn = db.get_connection()?;
            let stale_cutoff = Utc::now().timestamp() - STALE_CLAIM_SECS;
            let mut stmt = conn
                .prepare(&format!(
                    "{DOCUMENT_SELECT_SQL}
                     WHERE status IN ('pending', 'signed')
                        OR (status = 'building' AND COALESCE(updated_at, 0) < ?1)
                     ORDER BY created_at ASC
                     LIMIT ?2"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![stale_cutoff, i64::from(limit)], map_document_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
        .map_err(map_join_error)?
    }

    async fn submitted_for_reconciliation(&self, limit: u32) -> Result<Vec<FiscalDocument>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<FiscalDocument>> {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "{DOCUMENT_SELECT_SQL}
                     WHERE status = 'submitted'
                     ORDER BY created_at ASC
                     LIMIT ?1"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![i64::from(limit)], map_document_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
        .map_err(map_join_error)?
    }

    async fn claim_for_processing(&self, id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            let now = Utc::now().timestamp();
            let stale_cutoff = now - STALE_CLAIM_SECS;
            let affected = conn
                .execute(
                    "UPDATE fiscal_documents
                     SET status = 'building', updated_at = ?1
                     WHERE id = ?2
                       AND (status IN ('pending', 'signed')
                            OR (status = 'building' AND COALESCE(updated_at, 0) < ?3))",
                    params![now, id, stale_cutoff],
                )
                .map_err(map_sql_error)?;
            Ok(affected == 1)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn cdc_exists(&self, cdc: &str, excluding_id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let cdc = cdc.to_string();
        let excluding_id = excluding_id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            let exists: i64 = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM fiscal_documents WHERE cdc = ?1 AND id <> ?2)",
                    params![cdc, excluding_id],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(exists != 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, document: &FiscalDocument) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_update = document.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let now = Utc::now().timestamp();
            let affected = conn
                .execute(
                    "UPDATE fiscal_documents SET
                        snapshot_json = ?1, cdc = ?2, security_code = ?3, payload_json = ?4,
                        signed_payload = ?5, qr_url = ?6, protocol_number = ?7, status = ?8,
                        attempts = ?9, last_error = ?10, last_attempt_at = ?11, updated_at = ?12
                     WHERE id = ?13",
                    params![
                        to_update.snapshot_json,
                        to_update.cdc,
                        to_update.security_code,
                        to_update.payload_json,
                        to_update.signed_payload,
                        to_update.qr_url,
                        to_update.protocol_number,
                        to_update.status.to_string(),
                        to_update.attempts,
                        to_update.last_error,
                        to_update.last_attempt_at,
                        now,
                        to_update.id,
                    ],
                )
                .map_err(map_sql_error)?;
            if affected == 0 {
                return Err(EkuatiaError::NotFound(format!("document {}", to_update.id)));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn documents_by_status(
        &self,
        status: DocumentStatus,
        limit: u32,
    ) -> Result<Vec<FiscalDocument>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<FiscalDocument>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "{DOCUMENT_SELECT_SQL}
                     WHERE status = ?1
                     ORDER BY created_at DESC
                     LIMIT ?2"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![status.to_string(), i64::from(limit)], map_document_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error);
            rows
        })
        .await
        .map_err(map_join_error)?
    }
}

const DOCUMENT_INSERT_SQL: &str = "INSERT INTO fiscal_documents (
        id, source_id, company_id, kind, timbrado, establishment, point_of_sale, series, number,
        snapshot_json, cdc, security_code, payload_json, signed_payload, qr_url, protocol_number,
        status, attempts, last_error, last_attempt_at, issued_at, created_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
        ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
    )";

const DOCUMENT_SELECT_SQL: &str = "SELECT
        id, source_id, company_id, kind, timbrado, establishment, point_of_sale, series, number,
        snapshot_json, cdc, security_code, payload_json, signed_payload, qr_url, protocol_number,
        status, attempts, last_error, last_attempt_at, issued_at, created_at, updated_at
    FROM fiscal_documents";

fn map_document_row(row: &Row<'_>) -> rusqlite::Result<FiscalDocument> {
    let id: String = row.get(0)?;
    let kind_raw: String = row.get(3)?;
    let status_raw: String = row.get(16)?;
    let number: i64 = row.get(8)?;

    Ok(FiscalDocument {
        kind: parse_kind(&id, &kind_raw),
        status: parse_status(&id, &status_raw),
        id,
        source_id: row.get(1)?,
        company_id: row.get(2)?,
        timbrado: row.get(4)?,
        establishment: row.get(5)?,
        point_of_sale: row.get(6)?,
        series: row.get(7)?,
        number: u32::try_from(number).unwrap_or(0),
        snapshot_json: row.get(9)?,
        cdc: row.get(10)?,
        security_code: row.get(11)?,
        payload_json: row.get(12)?,
        signed_payload: row.get(13)?,
        qr_url: row.get(14)?,
        protocol_number: row.get(15)?,
        attempts: row.get(17)?,
        last_error: row.get(18)?,
        last_attempt_at: row.get(19)?,
        issued_at: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

fn parse_status(id: &str, raw: &str) -> DocumentStatus {
    match DocumentStatus::from_str(raw) {
        Ok(status) => status,
        Err(err) => {
            warn!(
                document_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid document status in storage, defaulting to pending"
            );
            DocumentStatus::Pending
        }
    }
}

fn parse_kind(id: &str, raw: &str) -> ekuatia_domain::DocumentKind {
    match ekuatia_domain::DocumentKind::from_str(raw) {
        Ok(kind) => kind,
        Err(err) => {
            warn!(
                document_id = %id,
                raw_kind = %raw,
                error = %err,
                "invalid document kind in storage, defaulting to invoice"
            );
            ekuatia_domain::DocumentKind::Invoice
        }
    }
}
