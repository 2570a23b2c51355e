//! Document signing
//!
//! Loads per-company key material, produces the detached signature artifact
//! over the canonical payload, and derives the QR verification URL. The
//! private key and the certificate password never reach logs or error text.

mod certificate;
mod qr;
mod signer;

pub use certificate::CompanySigningKey;
pub use qr::build_qr_url;
pub use signer::EkuatiaSigner;
