//! syncq CLI
//!
//! Operator tools for an on-disk syncq queue with JSON payloads.
//!
//! # Commands
//!
//! - `inspect` - Display journal size and operation counts
//! - `list` - List operations, pending ones first in dispatch order
//! - `dump-journal` - Dump raw journal records for debugging
//! - `compact` - Rewrite the journal, optionally pruning completed operations
//! - `resubmit` - Replace an operation with a fresh pending successor
//! - `remove` - Delete one operation
//! - `clear` - Delete every operation

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syncq_core::{OperationId, OperationStatus};
use tracing_subscriber::EnvFilter;

/// syncq queue maintenance tools.
#[derive(Parser)]
#[command(name = "syncq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue directory
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
    /// Display journal size and operation counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List operations
    List {
        /// Only show operations with this status
        #[arg(short, long)]
        status: Option<OperationStatus>,

        /// Maximum number of operations to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump journal records for debugging
    DumpJournal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite the journal to reclaim space
    Compact {
        /// Remove completed operations first
        #[arg(long)]
        prune_completed: bool,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Replace an operation with a fresh pending copy
    Resubmit {
        /// Operation ID
        id: OperationId,

        /// Replacement payload as JSON
        #[arg(long)]
        payload: Option<String>,
    },

    /// Remove one operation
    Remove {
        /// Operation ID
        id: OperationId,
    },

    /// Remove every operation
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
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
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Queue path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::List {
            status,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Queue path required for list")?;
            commands::list::run(&path, status, limit, &format)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Queue path required for dump-journal")?;
            commands::dump_journal::run(&path, limit, &format)?;
        }
        Commands::Compact {
            prune_completed,
            dry_run,
        } => {
            let path = cli.path.ok_or("Queue path required for compact")?;
            commands::compact::run(&path, prune_completed, dry_run)?;
        }
        Commands::Resubmit { id, payload } => {
            let path = cli.path.ok_or("Queue path required for resubmit")?;
            commands::edit::resubmit(&path, &id, payload.as_deref())?;
        }
        Commands::Remove { id } => {
            let path = cli.path.ok_or("Queue path required for remove")?;
            commands::edit::remove(&path, &id)?;
        }
        Commands::Clear { yes } => {
            let path = cli.path.ok_or("Queue path required for clear")?;
            if !yes {
                return Err("Refusing to clear the queue without --yes".into());
            }
            commands::edit::clear(&path)?;
        }
        Commands::Version => {
            println!("syncq CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("syncq core v{}", syncq_core::VERSION);
        }
    }

    Ok(())
}
