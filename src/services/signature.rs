//! HMAC-SHA256 helpers shared by webhook signing and payment verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Validation("Invalid signing key".to_string()))
}

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
pub fn sign_hex(secret: &str, message: &str) -> Result<String, AppError> {
    let mut mac = keyed(secret)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex-encoded signature.
pub fn verify_hex(secret: &str, message: &str, signature_hex: &str) -> Result<bool, AppError> {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return Ok(false);
    };
    let mut mac = keyed(secret)?;
    mac.update(message.as_bytes());
    Ok(mac.verify_slice(&expected).is_ok())
}
