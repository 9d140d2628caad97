//! Cryptographic utilities for webhook verification.
//!
//! The payment processor signs webhook bodies with HMAC-SHA256 over the raw
//! payload; the hex digest arrives in the `x-amp-signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return the hex-encoded digest (64 characters).
///
/// # Panics
///
/// Never panics in practice: HMAC-SHA256 accepts keys of any size per
/// RFC 2104, so `new_from_slice` only fails if the Hmac implementation is
/// broken.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    let result = mac.finalize();

    hex::encode(result.into_bytes())
}

/// Constant-time string comparison for signature checks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a webhook body against its signature header.
#[must_use]
pub fn verify_signature(secret: &str, body: &str, signature: &str) -> bool {
    constant_time_eq(&hmac_sha256_hex(secret, body), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_digest_is_64_hex_chars() {
        let digest = hmac_sha256_hex("key", "payload");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hmac_is_deterministic() {
        assert_eq!(
            hmac_sha256_hex("secret", "message"),
            hmac_sha256_hex("secret", "message")
        );
    }

    #[test]
    fn different_secrets_produce_different_digests() {
        assert_ne!(
            hmac_sha256_hex("secret-a", "message"),
            hmac_sha256_hex("secret-b", "message")
        );
    }

    #[test]
    fn verify_accepts_matching_signature() {
        let body = r#"{"event":"topup.confirmed"}"#;
        let sig = hmac_sha256_hex("whsec_test", body);
        assert!(verify_signature("whsec_test", body, &sig));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let sig = hmac_sha256_hex("whsec_test", "original");
        assert!(!verify_signature("whsec_test", "tampered", &sig));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
        assert!(constant_time_eq("", ""));
    }
}
