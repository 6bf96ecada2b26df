//! Webhook signature verification.
//!
//! The provider signs each delivery with a header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where each `v1` is
//! HMAC-SHA256 over `"{t}.{raw body}"` keyed by the endpoint's signing
//! secret. Several `v1` entries appear while a secret is being rolled.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

/// Maximum age of a signed delivery (5 minutes).
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Name of the signature header.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Reasons a delivery fails verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("no matching signature")]
    Mismatch,
}

/// Verify a webhook delivery against the signing secret.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns `SignatureError::MalformedHeader` if the header has no
/// timestamp or no `v1` entries, `TimestampOutOfTolerance` for stale or
/// future-dated deliveries and `Mismatch` if no signature matches.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &SecretString,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            Some(("v1", value)) => {
                // Undecodable entries simply cannot match
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    if now.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let mac = signed_mac(timestamp, payload, secret)?;

    // verify_slice compares in constant time
    if signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
    {
        tracing::debug!("Webhook signature verified");
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a signature header for `payload`, as the provider would.
///
/// Used to replay captured deliveries locally and in tests.
///
/// # Errors
///
/// Returns `SignatureError::MalformedHeader` if the secret cannot key the MAC.
pub fn sign_payload(
    payload: &[u8],
    secret: &SecretString,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let mac = signed_mac(timestamp, payload, secret)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(
    timestamp: i64,
    payload: &[u8],
    secret: &SecretString,
) -> Result<Hmac<Sha256>, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::MalformedHeader)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn secret() -> SecretString {
        SecretString::from("whsec_test_secret")
    }

    #[test]
    fn test_valid_signature() {
        let header = sign_payload(BODY, &secret(), NOW).unwrap();
        assert_eq!(verify_signature(&header, BODY, &secret(), NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign_payload(BODY, &secret(), NOW).unwrap();
        assert_eq!(
            verify_signature(&header, b"{}", &secret(), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign_payload(BODY, &SecretString::from("whsec_other"), NOW).unwrap();
        assert_eq!(
            verify_signature(&header, BODY, &secret(), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_and_future_timestamps() {
        let header = sign_payload(BODY, &secret(), NOW).unwrap();
        assert_eq!(
            verify_signature(&header, BODY, &secret(), NOW + TIMESTAMP_TOLERANCE_SECS + 1),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verify_signature(&header, BODY, &secret(), NOW - TIMESTAMP_TOLERANCE_SECS - 1),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verify_signature(&header, BODY, &secret(), NOW + TIMESTAMP_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1={}", "00".repeat(32));
            assert_eq!(
                verify_signature(&header, b"{}", &secret(), NOW),
                Err(SignatureError::TimestampOutOfTolerance),
                "timestamp {timestamp}"
            );
        }
    }

    #[test]
    fn test_any_v1_may_match() {
        let valid = sign_payload(BODY, &secret(), NOW).unwrap();
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={v1}", "00".repeat(32));
        assert_eq!(verify_signature(&header, BODY, &secret(), NOW), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        let only_timestamp = format!("t={NOW}");
        for header in ["", "v1=abcd", "t=abc,v1=abcd", only_timestamp.as_str()] {
            assert_eq!(
                verify_signature(header, BODY, &secret(), NOW),
                Err(SignatureError::MalformedHeader),
                "header {header:?}"
            );
        }
    }
}
