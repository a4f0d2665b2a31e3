// error.rs - Error types for the audit trail.

use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Entry content could not be serialized for hashing.
    #[error("failed to hash entry: {0}")]
    Hashing(#[from] covenant_crypto::CryptoError),

    /// The hash chain is broken at `index`.
    #[error("integrity check failed at entry {index} ({field}): expected {expected}, got {actual}")]
    IntegrityViolation {
        index: u64,
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// A Merkle proof was requested for an entry that does not exist.
    #[error("entry index {index} out of range for log of {len} entries")]
    IndexOutOfRange { index: u64, len: usize },
}
