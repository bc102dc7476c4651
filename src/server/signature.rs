//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify the HMAC-SHA256 signature GitHub computed over `payload` with `secret`
pub fn verify_signature(secret: &[u8], payload: &[u8], header: &str) -> Result<(), WebhookError> {
    let encoded = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| WebhookError::InvalidSignatureFormat("missing sha256= prefix".to_string()))?;

    let expected = hex::decode(encoded)
        .map_err(|e| WebhookError::InvalidSignatureFormat(e.to_string()))?;

    let actual = sign(secret, payload)?;

    if actual.as_slice().ct_eq(expected.as_slice()).into() {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

fn sign(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| WebhookError::Internal(e.to_string()))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Header value GitHub would send for `payload`
#[cfg(test)]
pub(crate) fn signature_header(secret: &[u8], payload: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(sign(secret, payload).unwrap()))
}
