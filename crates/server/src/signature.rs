//! Shared-secret signature check for inbound webhooks.
//!
//! The provider sends `x-webhook-timestamp` (unix seconds) and
//! `x-webhook-signature: v1=<hex>`, where the hex digest is
//! HMAC-SHA256 over `"{timestamp}.{raw body}"`.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
const SIGNATURE_VERSION: &str = "v1=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,
    #[error("timestamp is outside the {tolerance_secs}s tolerance window")]
    Expired { tolerance_secs: u64 },
    #[error("signature header is not a `v1=` hex digest")]
    InvalidFormat,
    #[error("signature does not match the request body")]
    Mismatch,
}

pub struct SignatureVerifier {
    secret: SecretString,
    tolerance_secs: u64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString, tolerance_secs: u64) -> Self {
        Self { secret, tolerance_secs }
    }

    pub fn verify(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = header_value(headers, TIMESTAMP_HEADER)?;
        let signature = header_value(headers, SIGNATURE_HEADER)?;

        let sent_at: i64 = timestamp.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        if now_unix.abs_diff(sent_at) > self.tolerance_secs {
            return Err(SignatureError::Expired { tolerance_secs: self.tolerance_secs });
        }

        let digest = signature
            .trim()
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::InvalidFormat)?;

        let mut mac = self.mac()?;
        mac.update(timestamp.trim().as_bytes());
        mac.update(b".");
        mac.update(body);
        // verify_slice compares in constant time.
        mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }

    /// Header value a sender would attach for `body` at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac = self.mac()?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(format!("{SIGNATURE_VERSION}{}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self) -> Result<HmacSha256, SignatureError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)
    }
}

fn header_value<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}
