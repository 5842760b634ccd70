//! Best-effort user identification from a stored bearer token.
//!
//! The middle segment of the token is decoded **without verifying the
//! signature or expiry**. The result is a display/routing convenience only
//! and must never gate access to anything; the API authorizes every request
//! on its own.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// Identifier of a FINTIVA user (`id_usuario`).
pub type UserId = u64;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// base64url, padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Standard alphabet, padding optional. Some issuers emit it in the payload.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode every claim of the token payload.
///
/// Returns `None` if the token has fewer than two dot-separated segments or
/// the second segment is not base64 JSON describing an object.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?.trim();

    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))
        .ok()?;

    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// Derive the user id from the token's `sub` claim.
///
/// `sub` may be a JSON number or a numeric string. Zero, negative,
/// fractional and non-finite values count as absent, as does any decoding
/// failure. Never panics.
pub fn extract_user_id(token: Option<&str>) -> Option<UserId> {
    let claims = decode_claims(token?)?;
    coerce_user_id(claims.get("sub")?)
}

fn coerce_user_id(sub: &Value) -> Option<UserId> {
    let n = match sub {
        Value::Number(n) => {
            if let Some(id) = n.as_u64() {
                return (id > 0).then_some(id);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if n.is_finite() && n >= 1.0 && n.fract() == 0.0 && n <= u64::MAX as f64 {
        Some(n as UserId)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    fn token_with_payload(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn numeric_string_subject() {
        let token = token_with_payload(r#"{"sub":"42"}"#);
        assert_eq!(extract_user_id(Some(&token)), Some(42));
    }

    #[test]
    fn numeric_subject() {
        let token = token_with_payload(r#"{"sub":7,"exp":1700000000}"#);
        assert_eq!(extract_user_id(Some(&token)), Some(7));
    }

    #[test]
    fn padded_and_standard_alphabet_payloads_decode() {
        let padded = format!("h.{}.s", STANDARD.encode(r#"{"sub":"9"}"#));
        assert_eq!(extract_user_id(Some(&padded)), Some(9));
    }

    #[test]
    fn two_segments_are_enough() {
        let token = format!("h.{}", URL_SAFE_NO_PAD.encode(r#"{"sub":"3"}"#));
        assert_eq!(extract_user_id(Some(&token)), Some(3));
    }

    #[test]
    fn absent_token() {
        assert_eq!(extract_user_id(None), None);
    }

    #[test]
    fn structurally_malformed_tokens() {
        for token in ["", "no-dots-here", ".", "a..b", "a.!!!.c", "a.bm90IGpzb24.c"] {
            assert_eq!(extract_user_id(Some(token)), None, "token {token:?}");
        }
    }

    #[test]
    fn missing_or_unusable_subject() {
        for payload in [
            r#"{}"#,
            r#"{"user":"42"}"#,
            r#"{"sub":null}"#,
            r#"{"sub":"abc"}"#,
            r#"{"sub":""}"#,
            r#"{"sub":"0"}"#,
            r#"{"sub":-5}"#,
            r#"{"sub":4.5}"#,
            r#"{"sub":"inf"}"#,
            r#"{"sub":"NaN"}"#,
            r#"{"sub":true}"#,
            r#"{"sub":[1]}"#,
            r#"[1,2]"#,
        ] {
            let token = token_with_payload(payload);
            assert_eq!(extract_user_id(Some(&token)), None, "payload {payload}");
        }
    }

    #[test]
    fn whitespace_around_numeric_subject_is_tolerated() {
        let token = token_with_payload(r#"{"sub":" 12 "}"#);
        assert_eq!(extract_user_id(Some(&token)), Some(12));
    }

    #[test]
    fn decode_claims_exposes_all_fields() {
        let token = token_with_payload(r#"{"sub":"42","exp":1700000000,"name":"Ana"}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["name"], "Ana");
        assert_eq!(claims["exp"], 1_700_000_000);
    }
}
