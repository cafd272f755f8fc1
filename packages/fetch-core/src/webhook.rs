//! Webhook envelope signing (spec §11 supplement): HMAC-SHA256 signed
//! payloads so a receiving endpoint can verify a delivery actually came
//! from this service. Delivery itself (retries, dead-lettering) is out of
//! scope; this module only signs and verifies.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Constant-time byte comparison so the signature check can't leak timing
/// information about how many leading bytes matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook secret has invalid length")]
    InvalidSecret,
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("signature mismatch")]
    SignatureMismatch,
}

pub struct SignedEnvelope {
    pub event: String,
    pub body: String,
    pub signature: String,
    pub timestamp: i64,
    pub test: bool,
}

impl SignedEnvelope {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-Webhook-Event", self.event.clone()),
            ("X-Webhook-Signature", format!("sha256={}", self.signature)),
            ("X-Webhook-Timestamp", self.timestamp.to_string()),
            ("X-Webhook-Test", self.test.to_string()),
        ]
    }
}

/// Signs `payload` for the given event name. `test` marks a delivery fired
/// from a "send test webhook" action rather than a real event.
pub fn sign<T: Serialize>(secret: &[u8], event: &str, payload: &T, test: bool) -> Result<SignedEnvelope, WebhookError> {
    let body = serde_json::to_string(payload)?;
    let signature = hex::encode(compute_signature(secret, body.as_bytes())?);
    Ok(SignedEnvelope { event: event.to_string(), body, signature, timestamp: Utc::now().timestamp(), test })
}

fn compute_signature(secret: &[u8], body: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verifies an `X-Webhook-Signature: sha256=<hex>` header against `body`
/// using a constant-time comparison, so a timing side-channel can't leak
/// the secret one byte at a time.
pub fn verify(secret: &[u8], body: &[u8], signature_header: &str) -> Result<(), WebhookError> {
    let hex_sig = signature_header.strip_prefix("sha256=").unwrap_or(signature_header);
    let provided = hex::decode(hex_sig).map_err(|_| WebhookError::SignatureMismatch)?;
    let expected = compute_signature(secret, body)?;

    if !constant_time_eq(&provided, &expected) {
        return Err(WebhookError::SignatureMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        url: String,
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"super-secret";
        let payload = Payload { url: "https://example.com".to_string() };
        let envelope = sign(secret, "fetch.completed", &payload, false).unwrap();

        let header = format!("sha256={}", envelope.signature);
        verify(secret, envelope.body.as_bytes(), &header).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let secret = b"super-secret";
        let payload = Payload { url: "https://example.com".to_string() };
        let envelope = sign(secret, "fetch.completed", &payload, false).unwrap();
        let header = format!("sha256={}", envelope.signature);

        let tampered = r#"{"url":"https://evil.example.com"}"#;
        let err = verify(secret, tampered.as_bytes(), &header).unwrap_err();
        assert!(matches!(err, WebhookError::SignatureMismatch));
    }
}
