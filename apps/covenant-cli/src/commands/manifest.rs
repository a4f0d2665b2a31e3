// manifest.rs - Manifest subcommands: generate, verify.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use covenant_enforcement::{CapabilityGate, CapabilityManifest};

use crate::config::CliConfig;

#[derive(Subcommand)]
pub enum ManifestCommands {
    /// Generate and sign a capability manifest.
    Generate {
        /// Constraints file in CCL.
        #[arg(long)]
        constraints: PathBuf,
        /// Covenant identifier.
        #[arg(long)]
        covenant_id: String,
        /// Runtime key written by `covenant keygen`.
        #[arg(long)]
        key: PathBuf,
        /// Output path (defaults to stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify a manifest's hash and signature.
    Verify {
        /// Path to the manifest JSON.
        #[arg(long)]
        manifest: PathBuf,
    },
}

pub fn execute(cmd: &ManifestCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        ManifestCommands::Generate {
            constraints,
            covenant_id,
            key,
            out,
        } => generate(config, constraints, covenant_id, key, out.as_deref()),
        ManifestCommands::Verify { manifest } => verify(manifest),
    }
}

fn generate(
    config: &CliConfig,
    constraints: &Path,
    covenant_id: &str,
    key: &Path,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let source = super::read_constraints(constraints)?;
    let keys = super::keygen::load_key(key)?;
    let gate = CapabilityGate::from_constraints(
        covenant_id,
        &source,
        keys,
        config.gate.runtime_type.clone(),
    )?;
    let manifest = gate.generate_manifest()?;
    super::write_json(out, &manifest)?;
    if let Some(out) = out {
        println!(
            "Manifest {} written to {} ({} capabilit{}).",
            manifest.manifest_hash,
            out.display(),
            manifest.capabilities.len(),
            if manifest.capabilities.len() == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn verify(path: &Path) -> anyhow::Result<()> {
    let manifest: CapabilityManifest = super::read_json(path)?;
    if !CapabilityGate::verify_manifest(&manifest) {
        println!("Manifest INVALID: hash or signature does not match its content.");
        anyhow::bail!("manifest verification failed");
    }
    println!(
        "Manifest verified: {} for covenant {} (runtime {}).",
        manifest.manifest_hash, manifest.covenant_id, manifest.runtime_type
    );
    Ok(())
}
