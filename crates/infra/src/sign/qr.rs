//! QR verification URL construction (SIFEN v150 template).
//!
//! The URL carries the CDC, the hex-encoded issue timestamp, receiver and
//! totals, the signature digest in hex, and a final `cHashQR` parameter:
//! SHA-256 over the URL-without-hash concatenated with the company's
//! contributor security code (CSC).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ekuatia_domain::constants::QR_VERSION;
use ekuatia_domain::CanonicalDocument;
use sha2::{Digest, Sha256};

/// Build the full QR verification URL for a signed document.
pub fn build_qr_url(
    qr_base: &str,
    canonical: &CanonicalDocument,
    digest_b64: &str,
    csc_id: &str,
    csc: &str,
) -> String {
    let cdc_digits: String = canonical.cdc.chars().filter(char::is_ascii_digit).collect();
    let date_hex = hex::encode(canonical.issued_at.as_bytes());
    let receiver_digits = receiver_digits(canonical);
    let digest_hex = base64_to_hex(digest_b64);

    let params = [
        format!("nVersion={QR_VERSION}"),
        format!("Id={cdc_digits}"),
        format!("dFeEmiDE={date_hex}"),
        format!("dRucRec={receiver_digits}"),
        format!("dTotGralOpe={}", canonical.totals.total),
        format!("dTotIVA={}", canonical.totals.vat_total),
        format!("cItems={}", canonical.items.len()),
        format!("DigestValue={digest_hex}"),
        format!("IdCSC={csc_id}"),
    ];

    let without_hash = format!("{qr_base}?{}", params.join("&"));
    let hash = hash_qr(&without_hash, csc);
    format!("{without_hash}&cHashQR={hash}")
}

/// The hash binds the URL to the company's CSC so a consumer cannot forge a
/// verification link.
fn hash_qr(url_without_hash: &str, csc: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url_without_hash.as_bytes());
    hasher.update(csc.as_bytes());
    hex::encode(hasher.finalize())
}

fn receiver_digits(canonical: &CanonicalDocument) -> String {
    let raw = canonical
        .receiver
        .ruc
        .as_deref()
        .or(canonical.receiver.id_number.as_deref())
        .unwrap_or("0");
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}

/// Hex-encode a base64 value; values that are not valid base64 are encoded
/// as plain text, mirroring the legacy behaviour.
fn base64_to_hex(value: &str) -> String {
    match BASE64.decode(value) {
        Ok(bytes) => hex::encode(bytes),
        Err(_) => hex::encode(value.as_bytes()),
    }
}
