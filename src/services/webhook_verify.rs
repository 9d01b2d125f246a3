//! Webhook signature contract
//!
//! Signing side used by the dispatcher and the verification side merchants
//! implement. Both operate on the raw request body bytes: the signature is
//! computed over the exact wire payload, never a re-serialization, so
//! key-ordering differences can not break verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried in the signature header
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 over the payload, rendered as a lowercase hex digest
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature against the raw request body.
///
/// Accepts the header value with or without the `sha256=` prefix. Fails
/// closed on anything unexpected (wrong length, non-hex input) and never
/// errors out; payload parsing belongs after this returns true.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let provided = signature
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or_else(|| signature.trim());

    let expected = sign_payload(payload, secret);
    secure_eq(expected.as_bytes(), provided.as_bytes())
}

/// Constant-time byte comparison
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let body = br#"{"event":"payment.confirmed","data":{"amount":"1000000"}}"#;
        let signature = sign_payload(body, "topsecret");

        assert!(verify_signature(body, &signature, "topsecret"));
        assert!(verify_signature(
            body,
            &format!("sha256={}", signature),
            "topsecret"
        ));
    }

    #[test]
    fn signature_is_lowercase_hex_of_expected_length() {
        let signature = sign_payload(b"body", "secret");
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let body = b"payload bytes";
        let signature = sign_payload(body, "secret");

        let mut tampered = body.to_vec();
        tampered[0] ^= 0x01;
        assert!(!verify_signature(&tampered, &signature, "secret"));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let body = b"payload bytes";
        let signature = sign_payload(body, "secret");

        let mut bytes = signature.into_bytes();
        bytes[0] = if bytes[0] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(!verify_signature(body, &tampered, "secret"));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = b"payload bytes";
        let signature = sign_payload(body, "secret");
        assert!(!verify_signature(body, &signature, "other-secret"));
    }

    #[test]
    fn malformed_signatures_fail_closed() {
        let body = b"payload bytes";
        assert!(!verify_signature(body, "", "secret"));
        assert!(!verify_signature(body, "sha256=", "secret"));
        assert!(!verify_signature(body, "not hex at all", "secret"));
        assert!(!verify_signature(body, "sha256=abc123", "secret"));
    }
}
