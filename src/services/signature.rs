use ring::hmac;

/// Signs a payload with HMAC-SHA256, returning a hex string.
pub fn sign(payload: &str, key: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, payload.as_bytes());
    hex::encode(tag.as_ref())
}

/// Verifies a hex HMAC-SHA256 signature in constant time.
pub fn verify(payload: &str, signature: &str, key: &[u8]) -> bool {
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, payload.as_bytes(), &sig_bytes).is_ok()
}

/// Derives a 32-byte key from a configured secret string.
/// Uses SHA-256 to ensure we always get exactly 32 bytes.
pub fn derive_key(key_string: &str) -> [u8; 32] {
    use ring::digest;

    let hash = digest::digest(&digest::SHA256, key_string.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(hash.as_ref());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_produces_hex() {
        let key = derive_key("test-signing-key");
        let sig = sign("payload", &key);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_accepts_own_signature() {
        let key = derive_key("test-signing-key");
        let sig = sign("payload", &key);
        assert!(verify("payload", &sig, &key));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let key = derive_key("test-signing-key");
        let sig = sign("payload", &key);
        assert!(!verify("payload2", &sig, &key));
    }

    #[test]
    fn verify_rejects_wrong_key_and_garbage() {
        let key = derive_key("key-one");
        let other = derive_key("key-two");
        let sig = sign("payload", &key);
        assert!(!verify("payload", &sig, &other));
        assert!(!verify("payload", "not-hex", &key));
    }
}
