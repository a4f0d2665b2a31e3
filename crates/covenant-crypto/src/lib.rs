//! # covenant-crypto
//!
//! Hashing and signing primitives shared by the Covenant crates.
//!
//! All digests are SHA-256, encoded as 64-character lowercase hex strings.
//! Structured values are hashed through a canonical JSON form (object keys
//! sorted, no insignificant whitespace) so the same content always yields
//! the same digest regardless of field declaration order.
//!
//! Signatures are Ed25519 via `ring`. Public keys and signatures travel as
//! hex strings so manifests stay plain JSON.
//!
//! ## Quick Example
//!
//! ```rust
//! use covenant_crypto::{hash_str, KeyPair};
//!
//! let digest = hash_str("hello");
//! let keys = KeyPair::generate().unwrap();
//! let signature = keys.sign_hex(&digest);
//! assert!(covenant_crypto::verify_hex(&digest, &signature, keys.public_key_hex()));
//! ```

pub mod canonical;
pub mod error;
pub mod hasher;
pub mod keys;

pub use canonical::{canonical_json, hash_object};
pub use error::CryptoError;
pub use hasher::{hash_bytes, hash_str};
pub use keys::{verify, verify_hex, KeyPair};
