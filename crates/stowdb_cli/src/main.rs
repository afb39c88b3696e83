//! StowDB CLI
//!
//! Command-line tools for inspecting StowDB store files.
//!
//! # Commands
//!
//! - `buckets` - List buckets and their entry counts
//! - `registry` - Show registered types and id counters
//! - `dump` - Dump the raw entries of one bucket
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stowdb_storage::{Engine, EngineOptions};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// StowDB command-line store tools.
#[derive(Parser)]
#[command(name = "stowdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List buckets and their entry counts
    Buckets,

    /// Show the type registry
    Registry {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump the raw entries of a bucket
    Dump {
        /// Bucket name, e.g. `Type.Widget` or `Index.Widget.Sku`
        #[arg(short, long)]
        bucket: String,

        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Buckets => {
            let path = cli.path.ok_or("Store path required for buckets")?;
            commands::buckets::run(&open_engine(&path)?)?;
        }
        Commands::Registry { format } => {
            let path = cli.path.ok_or("Store path required for registry")?;
            commands::registry::run(&open_engine(&path)?, &format)?;
        }
        Commands::Dump { bucket, limit } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&open_engine(&path)?, &bucket, limit)?;
        }
        Commands::Version => {
            println!("StowDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("StowDB Core v{}", stowdb_core::VERSION);
        }
    }

    Ok(())
}

/// Opens an existing store file without creating one.
fn open_engine(path: &Path) -> Result<Engine, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let engine = Engine::open_path(path, EngineOptions::new().sync_on_commit(false))?;
    debug!(path = %path.display(), log_len = engine.log_len(), "opened store file");
    Ok(engine)
}
