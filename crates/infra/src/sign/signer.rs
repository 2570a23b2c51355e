//! `DocumentSigner` implementation.
//!
//! Signs the serialized canonical payload with the company's key and derives
//! the QR verification URL. The artifact is fully deterministic: signing the
//! same canonical document with the same key always yields the same digest,
//! signature, and URL, which is what makes retried cycles safe.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ekuatia_core::{DocumentSigner, SignError};
use ekuatia_domain::{CanonicalDocument, CompanyProfile, SignedDocument};
use sha2::{Digest, Sha256};
use tokio::task;
use tracing::{debug, instrument};

use super::certificate::CompanySigningKey;
use super::qr;

/// Signature suite identifier recorded on the artifact.
const ALGORITHM: &str = "ed25519-sha256";

/// File-backed signer for canonical documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EkuatiaSigner;

impl EkuatiaSigner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentSigner for EkuatiaSigner {
    #[instrument(skip(self, canonical, company), fields(cdc = %canonical.cdc, company_id = %company.id))]
    async fn sign(
        &self,
        canonical: &CanonicalDocument,
        company: &CompanyProfile,
    ) -> Result<SignedDocument, SignError> {
        let payload = serde_json::to_vec(canonical)
            .map_err(|e| SignError::CryptoFailure(format!("payload serialization: {e}")))?;

        // Key loading and signing touch the filesystem and CPU; keep them
        // off the async runtime threads.
        let certificate = company.certificate.clone();
        let (digest, signature) = task::spawn_blocking(
            move || -> Result<(String, String), SignError> {
                let key = CompanySigningKey::load(&certificate)?;
                let digest = BASE64.encode(Sha256::digest(&payload));
                let signature = BASE64.encode(key.sign(&payload).to_bytes());
                Ok((digest, signature))
            },
        )
        .await
        .map_err(|e| SignError::CryptoFailure(format!("signing task failed: {e}")))??;

        let qr_url = qr::build_qr_url(
            &company.qr_base_url(),
            canonical,
            &digest,
            &company.csc_id,
            &company.csc,
        );

        debug!("document signed");

        Ok(SignedDocument { algorithm: ALGORITHM.to_string(), digest, signature, qr_url })
    }
}
