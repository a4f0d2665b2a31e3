//! # covenant-audit
//!
//! Tamper-evident audit trail for covenant decisions.
//!
//! Every decision is recorded as an [`AuditEntry`]. Entries form a hash
//! chain: each one stores the hash of its predecessor (or [`GENESIS_HASH`]
//! for the first) and a SHA-256 digest of its own canonical content. The
//! entry hashes are also the leaves of a binary Merkle tree, so a single
//! entry's inclusion can be proven against the root without revealing the
//! rest of the log.
//!
//! ## Quick Example
//!
//! ```rust
//! use covenant_audit::{AuditChain, EntryDraft, EntryResult, Outcome};
//!
//! let mut chain = AuditChain::new();
//! let draft = EntryDraft::new("file.read", "/data/users", EntryResult::permitted(), Outcome::Executed);
//! chain.append(draft).unwrap();
//! assert!(chain.verify().is_ok());
//! assert_eq!(chain.merkle_root(), chain.entries()[0].hash);
//! ```

pub mod chain;
pub mod entry;
pub mod error;
pub mod log;
pub mod merkle;

pub use chain::{verify_chain, AuditChain};
pub use entry::{AuditEntry, EntryDraft, EntryResult, Outcome};
pub use error::AuditError;
pub use log::AuditLog;
pub use merkle::{generate_merkle_proof, merkle_root, verify_merkle_proof, MerkleProof};

/// All-zero sentinel: the first entry's `previous_hash` and the root of an empty tree.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
