//! Request signing.
//!
//! A [`Signer`] turns the defining fields of a webhook call into a
//! signature string that the receiver can recompute with the shared secret.

use std::fmt::Debug;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::ConfigurationError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature for the built-in signers.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Computes the signature attached to a webhook call.
///
/// Implementations must be pure: identical inputs always produce the same
/// signature. A single instance is shared by every job built from the
/// same call configuration and may be invoked from several workers at once.
pub trait Signer: Send + Sync + Debug {
    /// Name of the header carrying the signature.
    fn signature_header_name(&self) -> &str;

    /// Computes the signature over the call's URL and payload.
    fn calculate_signature(&self, url: &str, payload: &serde_json::Value, secret: &str) -> String;
}

/// HMAC-SHA256 over the target URL and the JSON payload.
///
/// The signed message is `url`, a line feed, then the compact JSON encoding
/// of the payload. The signature is lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSigner;

impl Signer for DefaultSigner {
    fn signature_header_name(&self) -> &str {
        SIGNATURE_HEADER
    }

    fn calculate_signature(&self, url: &str, payload: &serde_json::Value, secret: &str) -> String {
        let mut mac = new_mac(secret);
        mac.update(url.as_bytes());
        mac.update(b"\n");
        mac.update(payload.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// HMAC-SHA256 over the JSON payload only.
///
/// Matches receivers that validate `hmac_sha256(secret, body)` without
/// knowing which URL they were reached on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadSigner;

impl Signer for PayloadSigner {
    fn signature_header_name(&self) -> &str {
        SIGNATURE_HEADER
    }

    fn calculate_signature(&self, _url: &str, payload: &serde_json::Value, secret: &str) -> String {
        let mut mac = new_mac(secret);
        mac.update(payload.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC is defined for keys of every length, including empty.
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
}

/// Looks up a built-in signer by its configuration name.
///
/// Accepted names: `default` / `hmac-sha256` for [`DefaultSigner`] and
/// `payload` for [`PayloadSigner`]. Matching ignores ASCII case.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidSigner`] for any other name.
pub fn signer_by_name(name: &str) -> Result<Arc<dyn Signer>, ConfigurationError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "default" | "hmac-sha256" | "default_signer" => Ok(Arc::new(DefaultSigner)),
        "payload" | "payload_signer" => Ok(Arc::new(PayloadSigner)),
        _ => Err(ConfigurationError::InvalidSigner(name.to_string())),
    }
}
