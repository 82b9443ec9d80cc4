// SPDX-License-Identifier: MIT
//! Per-session secret generation and request signing.
//!
//! Every request to the engine carries an `x-backend-hmac` header: the
//! hex-encoded HMAC-SHA256 of the request, keyed with a secret both sides
//! share for the lifetime of one engine session. The MAC is computed over the
//! method, path, and body digests individually, then over their
//! concatenation, so no component can be swapped without invalidating the
//! header. Only holders of the secret can produce a valid value.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request MAC, hex-encoded.
pub const HMAC_HEADER: &str = "x-backend-hmac";

/// Raw entropy per session secret. The transfer form is base64, so the key
/// the engine actually sees is 24 bytes of text.
pub const SECRET_LENGTH: usize = 16;

/// Generate `length` cryptographically random bytes, base64-encoded.
///
/// The encoded form *is* the secret: it is written verbatim to the
/// secret-transfer file and used verbatim as the MAC key on both sides.
pub fn generate_secret(length: usize) -> Vec<u8> {
    let mut raw = vec![0u8; length];
    OsRng.fill_bytes(&mut raw);
    BASE64.encode(raw).into_bytes()
}

fn hmac_digest(data: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn joined_digest(method: &str, path: &str, body: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut joined = hmac_digest(method.as_bytes(), secret);
    joined.extend_from_slice(&hmac_digest(path.as_bytes(), secret));
    joined.extend_from_slice(&hmac_digest(body, secret));
    joined
}

/// Compute the request MAC: `HMAC(HMAC(method) || HMAC(path) || HMAC(body))`.
///
/// Deterministic by construction — the engine recomputes the same value to
/// verify. Callers must sign the exact bytes that go on the wire: the method
/// name, the URL path component, and the raw body.
pub fn sign_request(method: &str, path: &str, body: &[u8], secret: &[u8]) -> Vec<u8> {
    hmac_digest(&joined_digest(method, path, body, secret), secret)
}

/// The MAC in header transport form (lowercase hex).
pub fn request_header_value(method: &str, path: &str, body: &[u8], secret: &[u8]) -> String {
    hex::encode(sign_request(method, path, body, secret))
}

/// Verify a received header value in constant time.
pub fn verify_request(
    method: &str,
    path: &str,
    body: &[u8],
    secret: &[u8],
    header_hex: &str,
) -> bool {
    let Ok(received) = hex::decode(header_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&joined_digest(method, path, body, secret));
    mac.verify_slice(&received).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use proptest::prelude::*;

    const SECRET: &[u8] = b"dGVzdC1zZWNyZXQtYnl0ZXM=";

    #[test]
    fn sign_is_deterministic() {
        let a = sign_request("POST", "/list_completions", b"{\"line\":1}", SECRET);
        let b = sign_request("POST", "/list_completions", b"{\"line\":1}", SECRET);
        assert_eq!(a, b);
    }

    #[test]
    fn changing_any_input_changes_the_mac() {
        let base = sign_request("POST", "/list_completions", b"{}", SECRET);
        assert_ne!(base, sign_request("GET", "/list_completions", b"{}", SECRET));
        assert_ne!(base, sign_request("POST", "/find_definition", b"{}", SECRET));
        assert_ne!(base, sign_request("POST", "/list_completions", b"{ }", SECRET));
        assert_ne!(base, sign_request("POST", "/list_completions", b"{}", b"other-secret"));
    }

    #[test]
    fn header_value_is_lowercase_hex_of_full_digest() {
        let value = request_header_value("GET", "/ping", b"", SECRET);
        // 32-byte SHA-256 output.
        assert_eq!(value.len(), 64);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn verify_accepts_matching_header() {
        let value = request_header_value("GET", "/ping", b"", SECRET);
        assert!(verify_request("GET", "/ping", b"", SECRET, &value));
    }

    #[test]
    fn verify_rejects_tampering() {
        let value = request_header_value("POST", "/list_completions", b"{}", SECRET);
        assert!(!verify_request("POST", "/list_completions", b"{}", b"wrong", &value));
        assert!(!verify_request("POST", "/find_definition", b"{}", SECRET, &value));
        assert!(!verify_request("POST", "/list_completions", b"{}", SECRET, "zz-not-hex"));
        assert!(!verify_request("POST", "/list_completions", b"{}", SECRET, ""));
    }

    #[test]
    fn secret_is_base64_of_requested_length() {
        let secret = generate_secret(SECRET_LENGTH);
        // 16 raw bytes -> 24 base64 chars, no padding surprises.
        assert_eq!(secret.len(), 24);
        let text = std::str::from_utf8(&secret).expect("base64 is ascii");
        assert_eq!(BASE64.decode(text).expect("valid base64").len(), SECRET_LENGTH);
    }

    #[test]
    fn secrets_are_not_reused() {
        let a = generate_secret(SECRET_LENGTH);
        let b = generate_secret(SECRET_LENGTH);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn no_collisions_across_paths(a in "[a-z_/]{1,24}", b in "[a-z_/]{1,24}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                sign_request("POST", &a, b"{}", SECRET),
                sign_request("POST", &b, b"{}", SECRET)
            );
        }

        #[test]
        fn no_collisions_across_bodies(a in proptest::collection::vec(any::<u8>(), 0..64),
                                       b in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(a != b);
            prop_assert_ne!(
                sign_request("POST", "/list_completions", &a, SECRET),
                sign_request("POST", "/list_completions", &b, SECRET)
            );
        }
    }
}
