// log.rs - Exportable audit log snapshot.
//
// An AuditLog is a read-only copy of a chain at one moment, tagged with
// its covenant and Merkle root. It serializes to plain JSON, so a caller
// can persist it and a third party can later re-verify both the chain and
// the root without access to the live monitor.

use serde::{Deserialize, Serialize};

use crate::chain::{verify_chain, AuditChain};
use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::merkle::{self, MerkleProof};

/// Point-in-time copy of an audit chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLog {
    pub covenant_id: String,
    pub entries: Vec<AuditEntry>,
    pub merkle_root: String,
    pub count: usize,
}

impl AuditLog {
    /// Snapshot `chain` for `covenant_id`.
    pub fn snapshot(covenant_id: impl Into<String>, chain: &AuditChain) -> Self {
        Self {
            covenant_id: covenant_id.into(),
            entries: chain.entries().to_vec(),
            merkle_root: chain.merkle_root(),
            count: chain.len(),
        }
    }

    fn leaves(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.hash.clone()).collect()
    }

    /// Verify the hash chain, the entry count and the recorded Merkle root.
    pub fn verify(&self) -> Result<(), AuditError> {
        verify_chain(&self.entries)?;
        if self.count != self.entries.len() {
            return Err(AuditError::IntegrityViolation {
                index: self.entries.len() as u64,
                field: "count",
                expected: self.entries.len().to_string(),
                actual: self.count.to_string(),
            });
        }
        let root = merkle::merkle_root(&self.leaves());
        if root != self.merkle_root {
            return Err(AuditError::IntegrityViolation {
                index: self.entries.len() as u64,
                field: "merkle_root",
                expected: root,
                actual: self.merkle_root.clone(),
            });
        }
        Ok(())
    }

    /// Inclusion proof for the entry at `index` against this snapshot.
    pub fn merkle_proof(&self, index: usize) -> Result<MerkleProof, AuditError> {
        merkle::generate_merkle_proof(&self.leaves(), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryDraft, EntryResult, Outcome};
    use crate::merkle::verify_merkle_proof;

    fn chain_of(n: usize) -> AuditChain {
        let mut chain = AuditChain::new();
        for i in 0..n {
            chain
                .append(EntryDraft::new(
                    format!("tool.call{}", i),
                    "/r",
                    EntryResult::permitted(),
                    Outcome::Executed,
                ))
                .unwrap();
        }
        chain
    }

    #[test]
    fn snapshot_verifies_and_survives_json() {
        let log = AuditLog::snapshot("cov-1", &chain_of(3));
        assert_eq!(log.count, 3);
        assert!(log.verify().is_ok());

        let json = serde_json::to_string_pretty(&log).unwrap();
        let restored: AuditLog = serde_json::from_str(&json).unwrap();
        assert!(restored.verify().is_ok());
        assert_eq!(restored, log);
    }

    #[test]
    fn forged_root_is_detected() {
        let mut log = AuditLog::snapshot("cov-1", &chain_of(2));
        log.merkle_root = crate::GENESIS_HASH.into();
        assert!(matches!(
            log.verify(),
            Err(AuditError::IntegrityViolation { field: "merkle_root", .. })
        ));
    }

    #[test]
    fn truncated_log_is_detected() {
        let mut log = AuditLog::snapshot("cov-1", &chain_of(3));
        log.entries.pop();
        assert!(log.verify().is_err());
    }

    #[test]
    fn snapshot_proofs_verify() {
        let log = AuditLog::snapshot("cov-1", &chain_of(5));
        for i in 0..5 {
            let proof = log.merkle_proof(i).unwrap();
            assert_eq!(proof.merkle_root, log.merkle_root);
            assert!(verify_merkle_proof(&proof));
        }
    }
}
