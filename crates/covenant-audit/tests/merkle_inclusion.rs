// merkle_inclusion.rs - Chain and Merkle behaviour across log sizes.
//
// Builds real hash chains of 1, 3, 4 and 8 entries (odd, even and
// power-of-two sizes) and checks roots, proofs and tamper detection
// through the public API only.

use covenant_audit::{
    generate_merkle_proof, merkle_root, verify_chain, verify_merkle_proof, AuditChain, AuditLog,
    EntryDraft, EntryResult, Outcome, GENESIS_HASH,
};
use covenant_ccl::Severity;
use covenant_crypto::hash_str;

fn build(n: usize) -> AuditChain {
    let mut chain = AuditChain::new();
    for i in 0..n {
        let (result, outcome) = if i % 3 == 2 {
            (
                EntryResult::denied("blocked", Some(Severity::High)),
                Outcome::Denied,
            )
        } else {
            (EntryResult::permitted(), Outcome::Executed)
        };
        chain
            .append(EntryDraft::new(
                format!("file.op{}", i),
                format!("/data/{}", i),
                result,
                outcome,
            ))
            .unwrap();
    }
    chain
}

fn pair(a: &str, b: &str) -> String {
    hash_str(&format!("{}{}", a, b))
}

#[test]
fn roots_match_hand_computed_trees() {
    let one = build(1);
    assert_eq!(one.merkle_root(), one.entries()[0].hash);

    let three = build(3);
    let h: Vec<&str> = three.entries().iter().map(|e| e.hash.as_str()).collect();
    assert_eq!(
        three.merkle_root(),
        pair(&pair(h[0], h[1]), &pair(h[2], h[2]))
    );

    let four = build(4);
    let h: Vec<&str> = four.entries().iter().map(|e| e.hash.as_str()).collect();
    assert_eq!(
        four.merkle_root(),
        pair(&pair(h[0], h[1]), &pair(h[2], h[3]))
    );

    let eight = build(8);
    let h: Vec<&str> = eight.entries().iter().map(|e| e.hash.as_str()).collect();
    let left = pair(&pair(h[0], h[1]), &pair(h[2], h[3]));
    let right = pair(&pair(h[4], h[5]), &pair(h[6], h[7]));
    assert_eq!(eight.merkle_root(), pair(&left, &right));
}

#[test]
fn root_is_stable_until_the_next_append() {
    let mut chain = build(3);
    let first = chain.merkle_root();
    assert_eq!(chain.merkle_root(), first);

    chain
        .append(EntryDraft::new(
            "file.read",
            "/data/x",
            EntryResult::permitted(),
            Outcome::Executed,
        ))
        .unwrap();
    assert_ne!(chain.merkle_root(), first);
}

#[test]
fn empty_chain_root_is_genesis() {
    assert_eq!(AuditChain::new().merkle_root(), GENESIS_HASH);
    assert_eq!(merkle_root(&[]), GENESIS_HASH);
}

#[test]
fn every_entry_has_a_valid_proof() {
    for n in [1, 3, 4, 8] {
        let chain = build(n);
        for i in 0..n {
            let proof = chain.merkle_proof(i).unwrap();
            assert_eq!(proof.entry_hash, chain.entries()[i].hash);
            assert_eq!(proof.index, i as u64);
            assert!(verify_merkle_proof(&proof), "n={} i={}", n, i);

            let mut forged = proof.clone();
            forged.entry_hash = hash_str("forged");
            assert!(!verify_merkle_proof(&forged));

            let mut forged = proof;
            forged.merkle_root = hash_str("forged");
            assert!(!verify_merkle_proof(&forged));
        }
    }
}

#[test]
fn free_functions_agree_with_chain() {
    let chain = build(4);
    let leaves: Vec<String> = chain.entries().iter().map(|e| e.hash.clone()).collect();
    assert_eq!(merkle_root(&leaves), chain.merkle_root());
    assert_eq!(
        generate_merkle_proof(&leaves, 1).unwrap(),
        chain.merkle_proof(1).unwrap()
    );
}

#[test]
fn exported_log_detects_single_field_edits() {
    let log = AuditLog::snapshot("a".repeat(64), &build(4));
    assert!(log.verify().is_ok());

    let mut edited = log.clone();
    edited.entries[1].action = "file.delete".into();
    assert!(verify_chain(&edited.entries).is_err());

    let mut edited = log.clone();
    edited.entries[3].hash = "0".repeat(64);
    assert!(verify_chain(&edited.entries).is_err());

    let mut edited = log;
    edited.entries[2].previous_hash = "1".repeat(64);
    assert!(verify_chain(&edited.entries).is_err());
}
