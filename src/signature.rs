//! Webhook Signature Verification
//!
//! GitHub signs webhook payloads with HMAC-SHA1 over the raw body, keyed by
//! the shared webhook secret, and sends it in the `X-Hub-Signature` header as
//! `sha1=<hex>`. Requests are rejected before any parsing unless this
//! signature verifies.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Algorithm tag prefixed to the hex digest
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Length of a hex-encoded SHA-1 digest
const DIGEST_HEX_LEN: usize = 40;

/// Parse a signature header (`sha1=<hex>`) into raw digest bytes
///
/// Only the canonical form GitHub sends is accepted: 40 lowercase hex digits.
/// Returns `None` for a missing or wrong prefix, a wrong length, or any other
/// character, uppercase hex included.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix(SIGNATURE_PREFIX)?;
    let canonical = hex_sig.len() == DIGEST_HEX_LEN
        && hex_sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !canonical {
        return None;
    }
    hex::decode(hex_sig).ok()
}

/// HMAC-SHA1 of `payload` keyed by `secret`
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Format a digest as a header value (`sha1=<hex>`)
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", hex::encode(signature))
}

/// Sign a payload and format the resulting header value
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    format_signature_header(&compute_signature(payload, secret))
}

/// Verify a webhook signature header against the payload and secret
///
/// The digest comparison runs in constant time.
///
/// # Examples
///
/// ```
/// use labelord::signature::{sign, verify_signature};
///
/// let payload = br#"{"action":"created"}"#;
/// let header = sign(payload, b"s3cr3t");
///
/// assert!(verify_signature(payload, &header, b"s3cr3t"));
/// assert!(!verify_signature(payload, &header, b"other"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vector() {
        // RFC 2202 test case 2
        let sig = compute_signature(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(
            format_signature_header(&sig),
            "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
        assert!(verify_signature(
            b"what do ya want for nothing?",
            "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79",
            b"Jefe"
        ));
    }

    #[test]
    fn test_uppercase_hex_rejected() {
        let payload = b"what do ya want for nothing?";
        assert!(!verify_signature(
            payload,
            "sha1=EFFCDF6AE5EB2FA2D27416D5F184DF9C259A7C79",
            b"Jefe"
        ));
        // A single digit changed to uppercase is a different header
        assert!(!verify_signature(
            payload,
            "sha1=Effcdf6ae5eb2fa2d27416d5f184df9c259a7c79",
            b"Jefe"
        ));
    }

    #[test]
    fn test_parse_signature_header_requires_canonical_digest() {
        let canonical = "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79";
        assert_eq!(parse_signature_header(canonical).map(|d| d.len()), Some(20));
        assert_eq!(parse_signature_header(&format!("{canonical}00")), None);
        assert_eq!(parse_signature_header(&canonical.to_uppercase()), None);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(b"payload", b"correct");
        assert!(verify_signature(b"payload", &header, b"correct"));
        assert!(!verify_signature(b"payload", &header, b"wrong"));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let payload = b"test";
        let secret = b"secret";
        assert!(!verify_signature(payload, "", secret));
        assert!(!verify_signature(payload, "sha1=", secret));
        assert!(!verify_signature(payload, "sha1=zz", secret));
        assert!(!verify_signature(payload, "sha1=abc", secret));
        assert!(!verify_signature(payload, "sha256=abcd", secret));
        assert!(!verify_signature(payload, "not-a-header", secret));
        // Digest without the algorithm tag
        let bare = hex::encode(compute_signature(payload, secret));
        assert!(!verify_signature(payload, &bare, secret));
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let header = sign(b"payload", b"secret");
        assert!(!verify_signature(b"payload", &header[..header.len() - 2], b"secret"));
    }

    #[test]
    fn test_signature_is_20_bytes() {
        assert_eq!(compute_signature(b"anything", b"key").len(), 20);
    }

    proptest! {
        #[test]
        fn prop_sign_verify_roundtrip(payload: Vec<u8>, secret: Vec<u8>) {
            let header = sign(&payload, &secret);
            prop_assert!(verify_signature(&payload, &header, &secret));
        }

        #[test]
        fn prop_payload_byte_flip_rejected(
            payload in prop::collection::vec(any::<u8>(), 1..64),
            secret: Vec<u8>,
            index: prop::sample::Index,
            flip in 1u8..=255,
        ) {
            let header = sign(&payload, &secret);
            let mut mutated = payload.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= flip;
            prop_assert!(!verify_signature(&mutated, &header, &secret));
        }

        #[test]
        fn prop_signature_char_change_rejected(
            payload: Vec<u8>,
            secret: Vec<u8>,
            index: prop::sample::Index,
        ) {
            let header = sign(&payload, &secret);
            let mut chars: Vec<char> = header.chars().collect();
            let i = SIGNATURE_PREFIX.len() + index.index(chars.len() - SIGNATURE_PREFIX.len());
            chars[i] = if chars[i] == '0' { '1' } else { '0' };
            let mutated: String = chars.into_iter().collect();
            prop_assert!(!verify_signature(&payload, &mutated, &secret));
        }

        #[test]
        fn prop_signature_case_flip_rejected(
            payload: Vec<u8>,
            secret: Vec<u8>,
            index: prop::sample::Index,
        ) {
            let header = sign(&payload, &secret);
            let digits: Vec<usize> = header
                .char_indices()
                .skip(SIGNATURE_PREFIX.len())
                .filter(|(_, c)| c.is_ascii_alphabetic())
                .map(|(i, _)| i)
                .collect();
            prop_assume!(!digits.is_empty());
            let i = digits[index.index(digits.len())];
            let mut mutated = header.clone();
            mutated.replace_range(i..=i, &header[i..=i].to_ascii_uppercase());
            prop_assert!(!verify_signature(&payload, &mutated, &secret));
        }

        #[test]
        fn prop_malformed_header_no_panic(header: String, payload: Vec<u8>) {
            let _ = verify_signature(&payload, &header, b"secret");
        }
    }
}
