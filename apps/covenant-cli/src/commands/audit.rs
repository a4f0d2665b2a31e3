// audit.rs - Audit subcommands: verify, prove.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde_json::json;

use covenant_audit::{verify_merkle_proof, AuditError, AuditLog};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the hash chain and Merkle root of an exported audit log.
    Verify {
        /// Path to the audit log JSON.
        #[arg(long)]
        log: PathBuf,
    },
    /// Print a Merkle inclusion proof for one entry.
    Prove {
        /// Path to the audit log JSON.
        #[arg(long)]
        log: PathBuf,
        /// Entry index.
        #[arg(long)]
        index: usize,
    },
}

pub fn execute(cmd: &AuditCommands) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => verify(log),
        AuditCommands::Prove { log, index } => prove(log, *index),
    }
}

fn verify(path: &Path) -> anyhow::Result<()> {
    let log: AuditLog = super::read_json(path)?;

    match log.verify() {
        Ok(()) => {
            println!(
                "Audit log verified: {} entr{}, hash chain intact.",
                log.count,
                if log.count == 1 { "y" } else { "ies" }
            );
            println!("Merkle root: {}", log.merkle_root);
            Ok(())
        }
        Err(AuditError::IntegrityViolation {
            index,
            field,
            expected,
            actual,
        }) => {
            println!("INTEGRITY VIOLATION at entry {} ({}):", index, field);
            println!("  Expected: {}", expected);
            println!("  Actual:   {}", actual);
            println!();
            println!("The audit log may have been tampered with.");
            anyhow::bail!("Audit log integrity check failed")
        }
        Err(e) => Err(e.into()),
    }
}

fn prove(path: &Path, index: usize) -> anyhow::Result<()> {
    let log: AuditLog = super::read_json(path)?;
    let proof = log.merkle_proof(index)?;
    let verified = verify_merkle_proof(&proof) && proof.merkle_root == log.merkle_root;
    super::write_json(None, &json!({ "proof": proof, "verified": verified }))?;
    if !verified {
        anyhow::bail!("proof for entry {} does not match the recorded Merkle root", index);
    }
    Ok(())
}
