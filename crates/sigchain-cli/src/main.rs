//! Sigchain CLI - offline tooling for signed audit chains.
//!
//! Verifies a persisted audit chain against a public-key registry, checks
//! detached manifest signatures, prints canonical JSON, and generates keys.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod theme;

use commands::{audit, canonicalize, keygen, manifest};

/// Sigchain - signed audit chains and callback verification
#[derive(Parser)]
#[command(name = "sigchain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to a configuration file
    #[arg(short, long, global = true, env = "SIGCHAIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and verify a persisted audit chain
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Check detached manifest signatures
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },

    /// Print the canonical form of a JSON document
    Canonicalize {
        /// Input file (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Generate a signing key
    Keygen {
        /// ed25519, hmac-sha256, or rsa-sha256
        #[arg(short, long, default_value = "ed25519")]
        algorithm: String,

        /// Key id for the printed registry entry
        #[arg(long, default_value = "sigchain-key")]
        kid: String,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Verify hash links and signatures
    Verify {
        /// SQLite database (defaults to storage.path)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Public-key registry JSON; without it only links are checked
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Treat unsigned events as failures
        #[arg(long)]
        require_signed: bool,
    },
    /// List recorded events
    Show {
        /// SQLite database (defaults to storage.path)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Show only the last N events
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Verify a signed manifest document
    Verify {
        /// Signed manifest JSON (`manifest`, `signature`, `kid`)
        #[arg(long)]
        manifest: PathBuf,

        /// Public-key registry JSON
        #[arg(long)]
        registry: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match sigchain_config::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", theme::Theme::warning(&format!("config not loaded: {e}")));
            sigchain_config::Config::default()
        },
    };

    let mut log_config = sigchain_telemetry::LogConfig::from_config(&config.logging)
        .unwrap_or_else(|_| sigchain_telemetry::LogConfig::new("info"));
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if cli.no_color {
        colored::control::set_override(false);
        log_config = log_config.without_ansi();
    }
    if let Err(e) = sigchain_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Audit { command } => match command {
            AuditCommands::Verify {
                db,
                registry,
                require_signed,
            } => {
                let db = audit::resolve_db(db, &config)?;
                audit::verify_chain(&db, registry.as_deref(), require_signed).await?;
            },
            AuditCommands::Show { db, limit } => {
                let db = audit::resolve_db(db, &config)?;
                audit::show_events(&db, limit).await?;
            },
        },
        Commands::Manifest { command } => match command {
            ManifestCommands::Verify { manifest, registry } => {
                manifest::verify_manifest(&manifest, &registry)?;
            },
        },
        Commands::Canonicalize { file } => {
            canonicalize::run(file.as_deref())?;
        },
        Commands::Keygen { algorithm, kid } => {
            keygen::run(&algorithm, &kid)?;
        },
    }

    Ok(())
}
