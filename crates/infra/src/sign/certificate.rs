//! Per-company signing-key storage.
//!
//! Key material lives in a JSON file per company: a base64 seed plus an
//! optional `not_after` expiry. Expiry is checked at load time so a rotated
//! but stale file surfaces as `CertificateExpired` instead of producing
//! signatures the authority will refuse.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey};
use ekuatia_core::SignError;
use ekuatia_domain::CompanyCertificate;
use serde::Deserialize;
use zeroize::Zeroize;

#[derive(Debug, Deserialize)]
struct CertificateFile {
    /// Base64-encoded 32-byte signing seed.
    seed: String,
    /// RFC 3339 expiry timestamp.
    #[serde(default)]
    not_after: Option<String>,
}

/// Loaded signing key for one company.
#[derive(Debug)]
pub struct CompanySigningKey {
    signing_key: SigningKey,
    not_after: Option<DateTime<Utc>>,
}

impl CompanySigningKey {
    /// Load and validate the key material configured for a company.
    pub fn load(certificate: &CompanyCertificate) -> Result<Self, SignError> {
        if certificate.key_path.trim().is_empty() {
            return Err(SignError::CertificateNotFound("certificate path not configured".into()));
        }
        if certificate.password.trim().is_empty() {
            return Err(SignError::CertificateNotFound(
                "certificate password not configured".into(),
            ));
        }

        let contents = std::fs::read_to_string(&certificate.key_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SignError::CertificateNotFound(certificate.key_path.clone())
            } else {
                SignError::CryptoFailure(format!(
                    "reading {}: {}",
                    certificate.key_path,
                    e.kind()
                ))
            }
        })?;

        let file: CertificateFile = serde_json::from_str(&contents)
            .map_err(|_| SignError::CryptoFailure("malformed certificate file".into()))?;

        let not_after = match &file.not_after {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| {
                        SignError::CryptoFailure("invalid certificate expiry timestamp".into())
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        if let Some(expiry) = not_after {
            if expiry <= Utc::now() {
                return Err(SignError::CertificateExpired(format!(
                    "{} expired at {}",
                    certificate.key_path, expiry
                )));
            }
        }

        let mut seed_bytes = BASE64
            .decode(file.seed.trim())
            .map_err(|_| SignError::CryptoFailure("certificate seed is not valid base64".into()))?;

        let seed: [u8; 32] = seed_bytes.as_slice().try_into().map_err(|_| {
            seed_bytes.zeroize();
            SignError::CryptoFailure("certificate seed must be 32 bytes".into())
        })?;
        seed_bytes.zeroize();

        Ok(Self { signing_key: SigningKey::from_bytes(&seed), not_after })
    }

    /// Sign a message (deterministic, no RNG).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verifying half of the key, for tests and diagnostics.
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Configured expiry, if any.
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }
}

impl Drop for CompanySigningKey {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
