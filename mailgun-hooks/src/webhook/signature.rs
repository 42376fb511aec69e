//! Mailgun webhook signature verification.
//!
//! Mailgun signs webhook requests using HMAC-SHA256.
//! Reference: https://documentation.mailgun.com/docs/mailgun/user-manual/events/webhooks/#securing-webhooks

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window in seconds (15 minutes). Timestamps skewed further
/// than this in either direction are rejected.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 900;

/// The signature triple Mailgun attaches to every webhook.
///
/// Ephemeral, constructed per request. Fields are `None` when the payload
/// omitted them; absence is handled by verification, not by extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureTuple {
    /// Unix epoch seconds when the webhook was generated
    pub timestamp: Option<String>,
    /// Randomly generated string
    pub token: Option<String>,
    /// HMAC-SHA256 hex digest of timestamp + token
    pub signature: Option<String>,
}

/// Verify a Mailgun webhook signature.
///
/// Mailgun webhooks include three fields for signature verification:
/// - timestamp: Unix epoch seconds when the webhook was generated
/// - token: A randomly generated string
/// - signature: HMAC-SHA256 hex digest of timestamp + token
///
/// Checks run in order and short-circuit to `false`; this function never
/// panics and never returns an error. Failure categories are logged, but
/// the signing key and the signature value itself are never logged.
///
/// # Arguments
///
/// * `signing_key` - Your Mailgun HTTP webhook signing key
/// * `timestamp` - The 'timestamp' field from the webhook payload
/// * `token` - The 'token' field from the webhook payload
/// * `signature` - The 'signature' field from the webhook payload
/// * `max_age_seconds` - Maximum allowed timestamp skew, both past and
///   future (prevents replay attacks)
///
/// # Returns
///
/// `true` if the signature is valid and inside the replay window,
/// `false` otherwise.
pub fn verify_signature(
    signing_key: &str,
    timestamp: &str,
    token: &str,
    signature: &str,
    max_age_seconds: u64,
) -> bool {
    // A missing signing key is a configuration error, not an attack.
    if signing_key.is_empty() {
        warn!("mailgun_signature_key_missing");
        return false;
    }

    if timestamp.is_empty() || token.is_empty() || signature.is_empty() {
        warn!(
            has_timestamp = !timestamp.is_empty(),
            has_token = !token.is_empty(),
            has_signature = !signature.is_empty(),
            "mailgun_signature_missing_fields"
        );
        return false;
    }

    // Mailgun timestamps are decimal seconds and may carry a fraction.
    let webhook_time: f64 = match timestamp.parse() {
        Ok(t) if f64::is_finite(t) => t,
        _ => {
            warn!(timestamp = %timestamp, "mailgun_signature_invalid_timestamp");
            return false;
        }
    };

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();

    // Both stale and future-dated timestamps are rejected (prevents replay
    // attacks and clock-skew forgery in either direction).
    let skew = (current_time - webhook_time).abs();
    if skew > max_age_seconds as f64 {
        warn!(
            webhook_time = webhook_time,
            current_time = current_time,
            skew_seconds = skew,
            max_age_seconds = max_age_seconds,
            "mailgun_signature_stale"
        );
        return false;
    }

    // Compute expected signature: HMAC-SHA256(signing_key, timestamp + token)
    let mut mac = match HmacSha256::new_from_slice(signing_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("mailgun_signature_invalid_key");
            return false;
        }
    };

    mac.update(format!("{}{}", timestamp, token).as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks
    let valid = constant_time_compare(&expected_signature, signature);

    if !valid {
        warn!(
            expected_length = expected_signature.len(),
            actual_length = signature.len(),
            "mailgun_signature_mismatch"
        );
    }

    valid
}

/// Locate the signature triple inside a parsed webhook body.
///
/// Event webhooks nest the triple under a `signature` object; inbound
/// webhooks carry it at the top level. The two shapes are structurally
/// different, and this adapter isolates that variance from verification.
pub fn extract_signature(body: &Value) -> SignatureTuple {
    let source = match body.get("signature") {
        Some(nested) if nested.is_object() => nested,
        _ => body,
    };

    let field = |name: &str| {
        source
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    SignatureTuple {
        timestamp: field("timestamp"),
        token: field("token"),
        signature: field("signature"),
    }
}

/// Extract the signature triple from a parsed body and verify it.
pub fn verify_request(body: &Value, signing_key: &str, max_age_seconds: u64) -> bool {
    let tuple = extract_signature(body);
    verify_signature(
        signing_key,
        tuple.timestamp.as_deref().unwrap_or(""),
        tuple.token.as_deref().unwrap_or(""),
        tuple.signature.as_deref().unwrap_or(""),
        max_age_seconds,
    )
}

/// Constant-time string comparison to prevent timing attacks.
///
/// A length mismatch returns false after a single length check; any byte
/// mismatch returns false without exiting early at the mismatch position.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn current_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(signing_key: &str, timestamp: &str, token: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).unwrap();
        mac.update(format!("{}{}", timestamp, token).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_missing_key() {
        assert!(!verify_signature("", "123", "token", "sig", 900));
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        assert!(!verify_signature("key", "", "token", "sig", 900));
        assert!(!verify_signature("key", "123", "", "sig", 900));
        assert!(!verify_signature("key", "123", "token", "", 900));
    }

    #[test]
    fn test_verify_signature_invalid_timestamp() {
        assert!(!verify_signature("key", "not-a-number", "token", "sig", 900));
        assert!(!verify_signature("key", "inf", "token", "sig", 900));
        assert!(!verify_signature("key", "NaN", "token", "sig", 900));
    }

    #[test]
    fn test_verify_signature_valid() {
        let signing_key = "k1";
        let timestamp = current_epoch().to_string();
        let token = "tok1";
        let signature = sign(signing_key, &timestamp, token);

        assert!(verify_signature(
            signing_key,
            &timestamp,
            token,
            &signature,
            DEFAULT_MAX_AGE_SECONDS
        ));
    }

    #[test]
    fn test_verify_signature_mutated_hex_char() {
        let signing_key = "k1";
        let timestamp = current_epoch().to_string();
        let token = "tok1";
        let mut signature = sign(signing_key, &timestamp, token);

        // Flip the last hex character.
        let last = signature.pop().unwrap();
        signature.push(if last == '0' { '1' } else { '0' });

        assert!(!verify_signature(
            signing_key,
            &timestamp,
            token,
            &signature,
            DEFAULT_MAX_AGE_SECONDS
        ));
    }

    #[test]
    fn test_verify_signature_wrong_length() {
        let signing_key = "k1";
        let timestamp = current_epoch().to_string();
        let token = "tok1";
        let mut signature = sign(signing_key, &timestamp, token);
        signature.pop();

        assert!(!verify_signature(
            signing_key,
            &timestamp,
            token,
            &signature,
            DEFAULT_MAX_AGE_SECONDS
        ));
    }

    #[test]
    fn test_replay_window_boundary() {
        let signing_key = "k1";
        let token = "tok1";

        // Just inside the window, in both directions.
        for offset in [-899i64, 899] {
            let timestamp = (current_epoch() as i64 + offset).to_string();
            let signature = sign(signing_key, &timestamp, token);
            assert!(
                verify_signature(signing_key, &timestamp, token, &signature, 900),
                "offset {} should be accepted",
                offset
            );
        }

        // Just outside the window, in both directions.
        for offset in [-902i64, 902] {
            let timestamp = (current_epoch() as i64 + offset).to_string();
            let signature = sign(signing_key, &timestamp, token);
            assert!(
                !verify_signature(signing_key, &timestamp, token, &signature, 900),
                "offset {} should be rejected",
                offset
            );
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_extract_signature_event_shape() {
        let body = json!({
            "signature": {
                "timestamp": "1700000000",
                "token": "tok",
                "signature": "abc123"
            },
            "event-data": {}
        });

        let tuple = extract_signature(&body);

        assert_eq!(tuple.timestamp.as_deref(), Some("1700000000"));
        assert_eq!(tuple.token.as_deref(), Some("tok"));
        assert_eq!(tuple.signature.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_signature_inbound_shape() {
        let body = json!({
            "timestamp": "1700000000",
            "token": "tok",
            "signature": "abc123",
            "recipient": "a@b.com"
        });

        let tuple = extract_signature(&body);

        assert_eq!(tuple.timestamp.as_deref(), Some("1700000000"));
        assert_eq!(tuple.token.as_deref(), Some("tok"));
        assert_eq!(tuple.signature.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_signature_missing_fields() {
        let tuple = extract_signature(&json!({ "recipient": "a@b.com" }));

        assert_eq!(tuple, SignatureTuple::default());
    }

    #[test]
    fn test_verify_request_event_shape() {
        let signing_key = "k1";
        let timestamp = current_epoch().to_string();
        let token = "tok1";
        let signature = sign(signing_key, &timestamp, token);

        let body = json!({
            "signature": {
                "timestamp": timestamp,
                "token": token,
                "signature": signature
            },
            "event-data": { "event": "delivered" }
        });

        assert!(verify_request(&body, signing_key, DEFAULT_MAX_AGE_SECONDS));
        assert!(!verify_request(&body, "other-key", DEFAULT_MAX_AGE_SECONDS));
    }
}
