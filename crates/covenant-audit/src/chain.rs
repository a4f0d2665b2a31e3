// chain.rs - In-memory append-only hash chain.
//
// `append()` is the only way entries enter the chain. It assigns the next
// index, links `previous_hash` to the last entry (or the genesis hash) and
// seals the entry with its content hash. `verify_chain()` recomputes both
// links for every entry and reports the first break.

use tracing::warn;

use crate::entry::{AuditEntry, EntryDraft};
use crate::error::AuditError;
use crate::merkle;
use crate::GENESIS_HASH;

/// An append-only list of hash-chained audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditChain {
    entries: Vec<AuditEntry>,
}

impl AuditChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal a draft into the next entry and append it.
    pub fn append(&mut self, draft: EntryDraft) -> Result<&AuditEntry, AuditError> {
        let previous_hash = self
            .entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut entry = AuditEntry {
            index: self.entries.len() as u64,
            timestamp: draft.timestamp,
            action: draft.action,
            resource: draft.resource,
            context: draft.context,
            result: draft.result,
            outcome: draft.outcome,
            previous_hash,
            hash: String::new(),
            error: draft.error,
        };
        entry.hash = entry.compute_hash()?;

        let index = self.entries.len();
        self.entries.push(entry);
        Ok(&self.entries[index])
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&AuditEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the newest entry, or the genesis hash when empty.
    pub fn head(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Check every link in the chain.
    pub fn verify(&self) -> Result<(), AuditError> {
        verify_chain(&self.entries)
    }

    /// Merkle root over the entry hashes.
    pub fn merkle_root(&self) -> String {
        merkle::merkle_root(&self.leaves())
    }

    /// Inclusion proof for the entry at `index`.
    pub fn merkle_proof(&self, index: usize) -> Result<merkle::MerkleProof, AuditError> {
        merkle::generate_merkle_proof(&self.leaves(), index)
    }

    pub(crate) fn leaves(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.hash.clone()).collect()
    }

    /// Drop every entry. The next append starts again from genesis.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Verify a sequence of entries as a hash chain.
///
/// Checks, in order, that each entry sits at its position, links to its
/// predecessor and carries the hash of its own content. An empty slice is
/// valid.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut expected_previous = GENESIS_HASH.to_string();

    for (position, entry) in entries.iter().enumerate() {
        let position = position as u64;
        if entry.index != position {
            return Err(violation(
                position,
                "index",
                position.to_string(),
                entry.index.to_string(),
            ));
        }
        if entry.previous_hash != expected_previous {
            return Err(violation(
                position,
                "previous_hash",
                expected_previous,
                entry.previous_hash.clone(),
            ));
        }
        let recomputed = entry.compute_hash()?;
        if entry.hash != recomputed {
            return Err(violation(position, "hash", recomputed, entry.hash.clone()));
        }
        expected_previous = entry.hash.clone();
    }

    Ok(())
}

fn violation(index: u64, field: &'static str, expected: String, actual: String) -> AuditError {
    warn!(index, field, "audit chain integrity violation");
    AuditError::IntegrityViolation {
        index,
        field,
        expected,
        actual,
    }
}
