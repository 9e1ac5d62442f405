//! kiosk - course content deployment CLI.
//!
//! Thin command layer over [`kiosk_core`]: each subcommand maps to one
//! engine operation, prints the operation's report, and exits non-zero
//! when the report shows tasks needing manual attention.

pub mod cmd;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiosk_core::Engine;
use std::path::PathBuf;

/// Command line interface definition.
#[derive(Debug, Parser)]
#[command(name = "kiosk")]
#[command(author, version, about = "Deploy and manage course content manifests")]
pub struct Cli {
    /// Deployment root (overrides config and KIOSK_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Artifact repository (overrides config and KIOSK_REPOSITORY)
    #[arg(long, global = true)]
    pub repository: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands, one per engine operation.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy a manifest, replacing any same-course predecessor
    Deploy {
        /// Path to the manifest file
        manifest: PathBuf,
        /// Directory holding the artifact payloads (defaults to the repository)
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Activate a quiesced manifest, quiescing the current one
    Activate {
        /// Manifest file name
        name: String,
    },
    /// Remove a manifest and its unshared artifacts
    Remove {
        /// Manifest file name
        name: String,
    },
    /// List deployed manifests and their states
    List,
    /// Validate deployed manifests without touching anything
    Validate {
        /// Manifest file name (all manifests when omitted)
        name: Option<String>,
    },
    /// Check deployed state against the manifests
    Verify {
        /// Manifest file name (all manifests when omitted)
        name: Option<String>,
        /// Also recompute and compare payload checksums
        #[arg(long)]
        checksums: bool,
    },
    /// Show how many bytes removing a manifest would free
    Size {
        /// Manifest file name
        name: String,
    },
}

/// Dispatch a parsed command line. Returns the operation's success
/// flag; `false` means the report listed manual tasks.
pub fn run(cli: Cli) -> Result<bool> {
    let config = config::Config::load()?.with_overrides(cli.root, cli.repository);
    tracing::debug!(
        "root {} repository {}",
        config.root.display(),
        config.repository.display()
    );
    let engine = Engine::with_real_system(&config.root);

    match cli.command {
        Commands::Deploy { manifest, source } => {
            let source = source.unwrap_or_else(|| config.repository.clone());
            cmd::deploy::deploy(&engine, &manifest, &source)
        }
        Commands::Activate { name } => cmd::activate::activate(&engine, &name),
        Commands::Remove { name } => cmd::remove::remove(&engine, &name),
        Commands::List => cmd::list::list(&engine),
        Commands::Validate { name } => cmd::validate::validate(&engine, name.as_deref()),
        Commands::Verify { name, checksums } => {
            cmd::verify::verify(&engine, name.as_deref(), checksums)
        }
        Commands::Size { name } => cmd::size::size(&engine, &name),
    }
}
