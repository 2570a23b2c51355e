//! SQLite-backed implementation of the company store port.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ekuatia_core::CompanyStore;
use ekuatia_domain::{
    CompanyCertificate, CompanyProfile, EndpointOverrides, Result, SifenEnvironment, TaxpayerType,
};
use rusqlite::{params, Row};
use tokio::task;
use tracing::warn;

use super::manager::{map_join_error, map_sql_error, DbManager};

/// SQLite-backed company repository.
pub struct SqliteCompanyRepository {
    db: Arc<DbManager>,
}

impl SqliteCompanyRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a company profile (administrative path).
    pub async fn upsert(&self, company: &CompanyProfile) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_insert = company.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT OR REPLACE INTO companies (
                    id, name, ruc, ruc_dv, taxpayer_type, environment, cert_key_path,
                    cert_password, csc_id, csc, submit_url, submit_batch_url,
                    query_document_url, query_ruc_url, qr_base_url
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    to_insert.id,
                    to_insert.name,
                    to_insert.ruc,
                    i64::from(to_insert.ruc_dv),
                    i64::from(to_insert.taxpayer_type.code()),
                    to_insert.environment.to_string(),
                    to_insert.certificate.key_path,
                    to_insert.certificate.password,
                    to_insert.csc_id,
                    to_insert.csc,
                    to_insert.endpoints.submit,
                    to_insert.endpoints.submit_batch,
                    to_insert.endpoints.query_document,
                    to_insert.endpoints.query_ruc,
                    to_insert.endpoints.qr_base,
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
impl CompanyStore for SqliteCompanyRepository {
    async fn get(&self, id: &str) -> Result<Option<CompanyProfile>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<CompanyProfile>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, ruc, ruc_dv, taxpayer_type, environment, cert_key_path,
                            cert_password, csc_id, csc, submit_url, submit_batch_url,
                            query_document_url, query_ruc_url, qr_base_url
                     FROM companies WHERE id = ?1",
                )
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![id], map_company_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_company_row(row: &Row<'_>) -> rusqlite::Result<CompanyProfile> {
    let id: String = row.get(0)?;
    let environment_raw: String = row.get(5)?;
    let taxpayer_code: i64 = row.get(4)?;

    let environment = match SifenEnvironment::from_str(&environment_raw) {
        Ok(environment) => environment,
        Err(err) => {
            warn!(
                company_id = %id,
                raw_environment = %environment_raw,
                error = %err,
                "invalid environment in storage, defaulting to test"
            );
            SifenEnvironment::Test
        }
    };

    let taxpayer_type = match taxpayer_code {
        1 => TaxpayerType::Natural,
        _ => TaxpayerType::Juridical,
    };

    Ok(CompanyProfile {
        id,
        name: row.get(1)?,
        ruc: row.get(2)?,
        ruc_dv: row.get::<_, i64>(3)?.clamp(0, 9) as u8,
        taxpayer_type,
        environment,
        certificate: CompanyCertificate { key_path: row.get(6)?, password: row.get(7)? },
        csc_id: row.get(8)?,
        csc: row.get(9)?,
        endpoints: EndpointOverrides {
            submit: row.get(10)?,
            submit_batch: row.get(11)?,
            query_document: row.get(12)?,
            query_ruc: row.get(13)?,
            qr_base: row.get(14)?,
        },
    })
}
