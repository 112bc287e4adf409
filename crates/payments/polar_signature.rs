use anyhow::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Headers Polar may put the signature in, checked in order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-polar-signature", "polar-signature"];

const SIGNATURE_PREFIX: &str = "sha256=";

/// Hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` (bare hex or `sha256=<hex>`) against the raw body.
///
/// The body must be the exact bytes received; re-serialised JSON will not match.
/// Comparison of the digests is constant-time.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let signature = signature.trim();
    let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);

    let Ok(provided) = hex::decode(signature) else {
        return Ok(false);
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(mac.verify_slice(&provided).is_ok())
}
