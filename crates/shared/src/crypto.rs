//! Cryptographic utilities for idempotency key hashing and request signing.

use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors produced while signing payloads.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signs `payload` with HMAC-SHA256 using `secret`, returning lowercase hex.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex HMAC-SHA256 signature in constant time.
pub fn verify_hmac_sha256_hex(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Generates a random alphanumeric token of the given length.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_different_inputs() {
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let sig = hmac_sha256_hex("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_empty_payload() {
        let sig = hmac_sha256_hex("secret", b"").unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_verify_roundtrip() {
        let body = br#"{"name":"Laptop Repair"}"#;
        let sig = hmac_sha256_hex("shared-secret", body).unwrap();
        assert!(verify_hmac_sha256_hex("shared-secret", body, &sig));
        assert!(!verify_hmac_sha256_hex("other-secret", body, &sig));
        assert!(!verify_hmac_sha256_hex("shared-secret", b"tampered", &sig));
    }

    #[test]
    fn test_verify_rejects_non_hex() {
        assert!(!verify_hmac_sha256_hex("secret", b"body", "not-hex"));
    }

    #[test]
    fn test_random_token() {
        let a = random_token(24);
        let b = random_token(24);
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
