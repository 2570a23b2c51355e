//! Shared fixtures for infra integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ekuatia_domain::{
    CompanyCertificate, CompanyProfile, DocumentKind, DocumentStatus, DocumentTotals,
    EndpointOverrides, FiscalDocument, LineItem, Receiver, ReceiverNature, SaleSnapshot,
    SifenEnvironment, TaxpayerType,
};
use ekuatia_infra::database::DbManager;
use tempfile::TempDir;

/// Database handle kept alive together with its backing directory.
pub struct TestDb {
    pub manager: Arc<DbManager>,
    pub temp_dir: TempDir,
}

/// Create a migrated database in a temp directory.
pub fn setup_db() -> TestDb {
    let temp_dir = TempDir::new().expect("temp dir created");
    let db_path = temp_dir.path().join("test.db");

    let manager = DbManager::new(&db_path, 4).expect("manager created");
    manager.run_migrations().expect("migrations applied");

    // Seed the `company-1` parent row that `make_document` references so
    // fiscal-document inserts satisfy the companies foreign key. Transport/queue
    // tests that need richer company data overwrite this via `upsert`
    // (INSERT OR REPLACE).
    {
        let conn = manager.get_connection().expect("connection acquired");
        conn.execute(
            "INSERT OR IGNORE INTO companies (
                id, name, ruc, ruc_dv, taxpayer_type, environment,
                cert_key_path, cert_password, csc_id, csc
            ) VALUES (
                'company-1', 'DISTRIBUIDORA GUARANI S.R.L.', '80012345', 7, 2, 'test',
                '', 'hunter2', '1', 'ABCD0000000000000000000000000000'
            )",
            [],
        )
        .expect("seed company");
    }

    TestDb { manager: Arc::new(manager), temp_dir }
}

/// Write an ed25519 key file and return its path.
pub fn write_key_file(temp_dir: &TempDir) -> String {
    let path = temp_dir.path().join("company.key");
    let seed = BASE64.encode([42u8; 32]);
    let mut file = std::fs::File::create(&path).expect("key file created");
    file.write_all(format!(r#"{{"seed":"{seed}"}}"#).as_bytes()).expect("key file written");
    path.display().to_string()
}

/// A company profile pointing at the given key path; endpoint overrides are
/// filled in by transport tests.
pub fn make_company(id: &str, key_path: &str) -> CompanyProfile {
    CompanyProfile {
        id: id.to_string(),
        name: "DISTRIBUIDORA GUARANI S.R.L.".into(),
        ruc: "80012345".into(),
        ruc_dv: 7,
        taxpayer_type: TaxpayerType::Juridical,
        environment: SifenEnvironment::Test,
        certificate: CompanyCertificate { key_path: key_path.into(), password: "hunter2".into() },
        csc_id: "1".into(),
        csc: "ABCD0000000000000000000000000000".into(),
        endpoints: EndpointOverrides::default(),
    }
}

pub fn sample_snapshot_json() -> String {
    let snapshot = SaleSnapshot {
        receiver: Receiver {
            name: "COMERCIAL DEL ESTE S.A.".into(),
            nature: ReceiverNature::Taxpayer,
            ruc: Some("80099999-2".into()),
            id_kind: None,
            id_number: None,
        },
        currency: "PYG".into(),
        items: vec![LineItem {
            description: "Servicio mensual".into(),
            quantity: 1.0,
            unit_price: 150_000,
            line_total: 150_000,
            vat_amount: 13_636,
        }],
        totals: DocumentTotals { total: 150_000, vat_total: 13_636 },
    };
    serde_json::to_string(&snapshot).expect("snapshot serializes")
}

/// A pending document for `company-1` with distinct numbering per `number`.
pub fn make_document(id: &str, number: u32, created_at: i64) -> FiscalDocument {
    FiscalDocument {
        id: id.to_string(),
        source_id: format!("sale-{number}"),
        company_id: "company-1".into(),
        kind: DocumentKind::Invoice,
        timbrado: "12345678".into(),
        establishment: "001".into(),
        point_of_sale: "003".into(),
        series: None,
        number,
        snapshot_json: Some(sample_snapshot_json()),
        cdc: None,
        security_code: None,
        payload_json: None,
        signed_payload: None,
        qr_url: None,
        protocol_number: None,
        status: DocumentStatus::Pending,
        attempts: 0,
        last_error: None,
        last_attempt_at: None,
        issued_at: created_at,
        created_at,
        updated_at: None,
    }
}
