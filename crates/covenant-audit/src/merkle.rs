// merkle.rs - Binary Merkle tree over audit entry hashes.
//
// Leaves are entry hashes in index order. Each level is reduced by hashing
// adjacent pairs as H(left + right), the concatenation of the two hex
// strings. A level with an odd count duplicates its last node first. The
// root of an empty tree is the genesis hash; a single leaf is its own root.
//
// A proof is the list of siblings met on the way from a leaf to the root.
// Whether the sibling sits to the left or right follows from the parity of
// the running index, which halves at every level.

use serde::{Deserialize, Serialize};

use covenant_crypto::hash_str;

use crate::error::AuditError;
use crate::GENESIS_HASH;

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub entry_hash: String,
    /// Sibling hashes from the leaf level upward.
    pub proof: Vec<String>,
    /// Leaf position.
    pub index: u64,
    /// Root the proof should reproduce.
    pub merkle_root: String,
}

fn combine(left: &str, right: &str) -> String {
    let mut joined = String::with_capacity(left.len() + right.len());
    joined.push_str(left);
    joined.push_str(right);
    hash_str(&joined)
}

/// Pad an odd level by repeating its last node.
fn pad(level: &mut Vec<String>) {
    if level.len() % 2 == 1 {
        if let Some(last) = level.last().cloned() {
            level.push(last);
        }
    }
}

fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| combine(&pair[0], &pair[1]))
        .collect()
}

/// Compute the Merkle root of `leaves`.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return GENESIS_HASH.to_string();
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        // Padding is per level: 5 leaves pad at the bottom and again one
        // level up.
        pad(&mut level);
        level = next_level(&level);
    }
    level.swap_remove(0)
}

/// Build an inclusion proof for the leaf at `index`.
pub fn generate_merkle_proof(leaves: &[String], index: usize) -> Result<MerkleProof, AuditError> {
    if index >= leaves.len() {
        return Err(AuditError::IndexOutOfRange {
            index: index as u64,
            len: leaves.len(),
        });
    }

    let mut proof = Vec::new();
    let mut level = leaves.to_vec();
    let mut idx = index;

    while level.len() > 1 {
        pad(&mut level);
        // After padding every even index has a right neighbour. The last
        // leaf of an odd level is its own sibling.
        let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        proof.push(level[sibling].clone());
        level = next_level(&level);
        idx /= 2;
    }

    Ok(MerkleProof {
        entry_hash: leaves[index].clone(),
        proof,
        index: index as u64,
        merkle_root: level.swap_remove(0),
    })
}

/// Check that `proof` reproduces its claimed root.
pub fn verify_merkle_proof(proof: &MerkleProof) -> bool {
    let mut current = proof.entry_hash.clone();
    let mut idx = proof.index;

    for sibling in &proof.proof {
        // Even index: we are the left child.
        current = if idx % 2 == 0 {
            combine(&current, sibling)
        } else {
            combine(sibling, &current)
        };
        idx /= 2;
    }

    current == proof.merkle_root
}
