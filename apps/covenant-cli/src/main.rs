//! # covenant-cli
//!
//! Command-line interface for Covenant.
//!
//! - `covenant check` - evaluate one action against a constraints file
//! - `covenant replay` - run a JSONL request log through a monitor and export the audit log
//! - `covenant audit verify/prove` - re-verify an exported audit log, prove entry inclusion
//! - `covenant keygen` - create an Ed25519 runtime key
//! - `covenant manifest generate/verify` - issue and check signed capability manifests

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{CliConfig, LogFormat, LogSettings};

/// Covenant CLI - enforce and audit agent action policies.
#[derive(Parser)]
#[command(name = "covenant", version, about)]
struct Cli {
    /// Configuration file (defaults to ./covenant.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single action and print the decision with its audit entry.
    Check {
        /// Constraints file in CCL.
        #[arg(long)]
        constraints: PathBuf,
        /// Covenant identifier.
        #[arg(long)]
        covenant_id: String,
        /// Dotted action name (e.g., file.read).
        #[arg(long)]
        action: String,
        /// Target resource (e.g., /data/users).
        #[arg(long)]
        resource: String,
        /// Context entries, repeatable.
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },
    /// Replay a JSONL file of requests through one monitor.
    Replay {
        /// Constraints file in CCL.
        #[arg(long)]
        constraints: PathBuf,
        /// Covenant identifier.
        #[arg(long)]
        covenant_id: String,
        /// One JSON request per line: {"action", "resource", "context"}.
        #[arg(long)]
        requests: PathBuf,
        /// Where to write the resulting audit log.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Inspect an exported audit log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Generate an Ed25519 runtime key (PKCS#8).
    Keygen {
        /// Output path for the key.
        #[arg(long)]
        out: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Issue and verify signed capability manifests.
    Manifest {
        #[command(subcommand)]
        command: commands::manifest::ManifestCommands,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log)?;

    match &cli.command {
        Commands::Check {
            constraints,
            covenant_id,
            action,
            resource,
            context,
        } => commands::check::execute(&config, constraints, covenant_id, action, resource, context),
        Commands::Replay {
            constraints,
            covenant_id,
            requests,
            out,
        } => commands::replay::execute(&config, constraints, covenant_id, requests, out.as_deref()),
        Commands::Audit { command } => commands::audit::execute(command),
        Commands::Keygen { out, force } => commands::keygen::execute(out, *force),
        Commands::Manifest { command } => commands::manifest::execute(command, &config),
    }
}

fn init_tracing(log: &LogSettings) -> Result<()> {
    // Logs go to stderr so JSON on stdout stays machine-readable.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.filter)?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}
