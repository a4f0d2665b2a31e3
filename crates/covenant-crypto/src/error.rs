// error.rs - Error types for hashing and signing.

use thiserror::Error;

/// Errors that can occur while hashing or signing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A value could not be converted to JSON for canonical hashing.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The system random source failed while generating a key.
    #[error("key generation failed")]
    KeyGeneration,

    /// PKCS#8 bytes were not a valid Ed25519 private key.
    #[error("key rejected: {0}")]
    KeyRejected(String),
}
