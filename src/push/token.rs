//! Push token minting and verification (C1).
//!
//! A push token is a stateless, HMAC-bound bearer string: a JSON-encoded
//! `(event, expires_ms)` tuple, base64url-encoded and signed with the
//! process-wide [`HmacKey`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

use crate::error::{DomainError, InvalidPushToken};
use crate::ports::Clock;

use super::key::HmacKey;

/// Default lifetime of a freshly minted push token when no explicit
/// expiry is supplied.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(20);

/// Allowed clock skew when checking token expiry.
const CLOCK_SKEW: Duration = Duration::minutes(5);

/// The two parts of a freshly minted push token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTokenPair {
    /// The full bearer token: `"u" + payload + "." + "u" + signature`.
    pub token: String,
    /// The signature half alone (multibase-`u` encoded).
    pub signature: String,
}

/// The result of successfully verifying a push token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPush {
    /// The event name bound into the token.
    pub event: String,
    /// The token's absolute expiry.
    pub expires: DateTime<Utc>,
}

/// Mint a push token binding `event` to `key`, expiring at `expires` (or
/// `now + 20min` when omitted).
#[must_use]
pub fn create_push_token(
    key: &HmacKey,
    event: &str,
    expires: Option<DateTime<Utc>>,
    clock: &dyn Clock,
) -> PushTokenPair {
    let expires = expires.unwrap_or_else(|| clock.now() + DEFAULT_TOKEN_LIFETIME);
    let payload_b64 = encode_payload(event, expires.timestamp_millis());
    let signature_b64 = URL_SAFE_NO_PAD.encode(key.sign(payload_b64.as_bytes()));

    let signature = format!("u{signature_b64}");
    let token = format!("u{payload_b64}.{signature}");
    PushTokenPair { token, signature }
}

/// Verify `token` against `key`, optionally requiring a specific `event`.
///
/// Returns [`InvalidPushToken`] — an opaque error — on any failure: a
/// malformed token, an expired token, an event mismatch, or a signature
/// mismatch are all indistinguishable to the caller. Signature comparison
/// runs in constant time with respect to where the signatures first
/// differ.
///
/// # Errors
///
/// Returns [`InvalidPushToken`] if verification fails for any reason.
pub fn verify_push_token(
    key: &HmacKey,
    token: &str,
    expected_event: Option<&str>,
    clock: &dyn Clock,
) -> Result<VerifiedPush, InvalidPushToken> {
    verify_inner(key, token, expected_event, clock).map_err(InvalidPushToken::new)
}

fn verify_inner(
    key: &HmacKey,
    token: &str,
    expected_event: Option<&str>,
    clock: &dyn Clock,
) -> Result<VerifiedPush, DomainError> {
    let (payload_part, signature_part) = token.split_once('.').ok_or(DomainError::Syntax)?;
    let payload_b64 = payload_part.strip_prefix('u').ok_or(DomainError::Syntax)?;
    let signature_b64 = signature_part.strip_prefix('u').ok_or(DomainError::Syntax)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| DomainError::Syntax)?;
    let (event, expires_ms) = decode_payload(&payload_bytes)?;
    let expires = DateTime::from_timestamp_millis(expires_ms).ok_or(DomainError::Syntax)?;

    if expires < clock.now() - CLOCK_SKEW {
        return Err(DomainError::Constraint("push token expired".into()));
    }
    if let Some(expected) = expected_event {
        if expected != event {
            return Err(DomainError::Constraint("push event mismatch".into()));
        }
    }

    let presented_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| DomainError::Syntax)?;
    let expected_signature = key.sign(payload_b64.as_bytes());
    if expected_signature.ct_eq(&presented_signature).unwrap_u8() != 1 {
        return Err(DomainError::Constraint("push signature mismatch".into()));
    }

    Ok(VerifiedPush { event, expires })
}

fn encode_payload(event: &str, expires_ms: i64) -> String {
    let json = serde_json::to_vec(&(event, expires_ms))
        .unwrap_or_else(|_| b"[]".to_vec());
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_payload(bytes: &[u8]) -> Result<(String, i64), DomainError> {
    let (event, expires_ms): (String, i64) =
        serde_json::from_slice(bytes).map_err(|_| DomainError::Syntax)?;
    Ok((event, expires_ms))
}
