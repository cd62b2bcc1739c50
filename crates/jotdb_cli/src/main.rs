//! JotDB CLI
//!
//! Command-line tools for working with JotDB log files.
//!
//! # Commands
//!
//! - `inspect` - Pretty-print the records in a log
//! - `verify` - Decode every line and report malformed ones
//! - `compact` - Rewrite the log to one line per live document
//! - `stats` - Record, tombstone and overwrite counts

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// JotDB command-line log tools.
#[derive(Parser)]
#[command(name = "jotdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log file
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
    /// Pretty-print the records in a log
    Inspect {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip this many records first
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode every line and report malformed ones
    Verify,

    /// Rewrite the log to one line per live document
    Compact {
        /// Dry run - report what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Record, tombstone and overwrite counts
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            limit,
            offset,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, limit, offset, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Log path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Stats { format } => {
            let path = cli.path.ok_or("Log path required for stats")?;
            commands::stats::run(&path, &format)?;
        }
        Commands::Version => {
            println!("JotDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("JotDB Core v{}", jotdb_core::VERSION);
        }
    }

    Ok(())
}
