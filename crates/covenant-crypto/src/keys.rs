// keys.rs - Ed25519 key pairs, signing and verification.
//
// Runtime keys sign capability manifests. The private half never leaves
// the `KeyPair`; callers persist it as PKCS#8 bytes if they need to reload
// the same identity later.

use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair as _, UnparsedPublicKey};

use crate::error::CryptoError;

/// An Ed25519 signing key with its hex-encoded public half.
pub struct KeyPair {
    inner: Ed25519KeyPair,
    public_key_hex: String,
}

impl KeyPair {
    /// Generate a fresh key from the system random source.
    pub fn generate() -> Result<Self, CryptoError> {
        let pkcs8 = Self::generate_pkcs8()?;
        Self::from_pkcs8(&pkcs8)
    }

    /// Generate a fresh key and return it PKCS#8-encoded, ready to store.
    pub fn generate_pkcs8() -> Result<Vec<u8>, CryptoError> {
        let rng = SystemRandom::new();
        let document =
            Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| CryptoError::KeyGeneration)?;
        Ok(document.as_ref().to_vec())
    }

    /// Load a key from PKCS#8 bytes.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, CryptoError> {
        let inner = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| CryptoError::KeyRejected(e.to_string()))?;
        let public_key_hex = hex::encode(inner.public_key().as_ref());
        Ok(Self {
            inner,
            public_key_hex,
        })
    }

    /// Raw 32-byte public key.
    pub fn public_key(&self) -> &[u8] {
        self.inner.public_key().as_ref()
    }

    /// Public key as lowercase hex.
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Sign a message, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.sign(message).as_ref().to_vec()
    }

    /// Sign a UTF-8 payload, returning the signature as hex.
    pub fn sign_hex(&self, payload: &str) -> String {
        hex::encode(self.sign(payload.as_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_hex", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature over `message`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(message, signature)
        .is_ok()
}

/// Verify a hex-encoded signature over a UTF-8 payload with a hex public key.
///
/// Only canonical lowercase hex is accepted, so every character of the
/// encoded signature is significant. Malformed hex fails verification.
pub fn verify_hex(payload: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let (Some(signature), Some(public_key)) =
        (decode_canonical(signature_hex), decode_canonical(public_key_hex))
    else {
        return false;
    };
    verify(payload.as_bytes(), &signature, &public_key)
}

fn decode_canonical(encoded: &str) -> Option<Vec<u8>> {
    let bytes = hex::decode(encoded).ok()?;
    // `hex::decode` accepts either case. Re-encoding pins the form to the
    // lowercase hex `sign_hex` emits, so a case flip is a changed signature.
    (hex::encode(&bytes) == encoded).then_some(bytes)
}
