// hasher.rs - SHA-256 hashing utilities.
//
// Every digest in Covenant is SHA-256, hex-encoded. Audit entry hashes,
// Merkle nodes and manifest hashes all go through these two functions.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    // `format!("{:x}", ...)` on the digest produces lowercase hex.
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_determinism() {
        let input = b"hello world";
        // Same input must always produce the same hash.
        assert_eq!(hash_bytes(input), hash_bytes(input));
    }

    #[test]
    fn hash_uniqueness() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn hash_is_hex_encoded_sha256() {
        let hash = hash_str("test");
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("") is a fixed, well-known digest.
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
