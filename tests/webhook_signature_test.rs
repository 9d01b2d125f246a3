//! Webhook signature contract tests: the dispatcher's signing side and the
//! merchant-facing verification side must agree over the raw body bytes.

use cryptopay_backend::services::webhook_verify::{
    secure_eq, sign_payload, verify_signature, SIGNATURE_PREFIX,
};

#[test]
fn sign_verify_round_trip_for_assorted_bodies_and_secrets() {
    let bodies: [&[u8]; 4] = [
        b"",
        b"{}",
        br#"{"id":"6a1c9518-6d51-4cbb-91c5-988cd2af2b2f","event":"payment.confirmed"}"#,
        b"\xff\xfe binary is fine too \x00",
    ];
    let secrets = ["s", "longer secret with spaces", "0123456789abcdef"];

    for body in bodies {
        for secret in secrets {
            let signature = sign_payload(body, secret);
            assert!(verify_signature(body, &signature, secret));
            assert!(verify_signature(
                body,
                &format!("{}{}", SIGNATURE_PREFIX, signature),
                secret
            ));
        }
    }
}

#[test]
fn flipping_any_body_byte_breaks_verification() {
    let body = br#"{"event":"payment.confirmed","data":{"amount":"1000000"}}"#;
    let signature = sign_payload(body, "secret");

    for i in 0..body.len() {
        let mut tampered = body.to_vec();
        tampered[i] ^= 0x01;
        assert!(
            !verify_signature(&tampered, &signature, "secret"),
            "byte {} flip went undetected",
            i
        );
    }
}

#[test]
fn flipping_any_signature_char_breaks_verification() {
    let body = b"notification payload";
    let signature = sign_payload(body, "secret");

    for i in 0..signature.len() {
        let mut bytes = signature.clone().into_bytes();
        bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(
            !verify_signature(body, &tampered, "secret"),
            "char {} flip went undetected",
            i
        );
    }
}

#[test]
fn verification_fails_closed_on_malformed_header_values() {
    let body = b"payload";

    assert!(!verify_signature(body, "", "secret"));
    assert!(!verify_signature(body, "sha256=", "secret"));
    assert!(!verify_signature(body, "sha512=deadbeef", "secret"));
    assert!(!verify_signature(body, "zz".repeat(32).as_str(), "secret"));
    // Right length, wrong casing: digests are lowercase hex
    let upper = sign_payload(body, "secret").to_uppercase();
    assert!(!verify_signature(body, &upper, "secret"));
}

#[test]
fn verification_requires_the_raw_bytes_not_a_reserialization() {
    // Same JSON value, different key order: a receiver that re-serializes
    // before verifying would accept neither or the wrong one.
    let sent: &[u8] = br#"{"b":2,"a":1}"#;
    let reserialized: &[u8] = br#"{"a":1,"b":2}"#;
    let signature = sign_payload(sent, "secret");

    assert!(verify_signature(sent, &signature, "secret"));
    assert!(!verify_signature(reserialized, &signature, "secret"));
}

#[test]
fn secure_eq_rejects_length_mismatch_without_panicking() {
    assert!(!secure_eq(b"short", b"longer input"));
    assert!(secure_eq(b"", b""));
}
