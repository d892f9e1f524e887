//! ScoreDB CLI
//!
//! Command-line tools for content-addressed ScoreDB stores.
//!
//! # Commands
//!
//! - `new` - Create an empty store
//! - `write` - Store a file (or stdin) and print its score
//! - `read` - Print the payload stored under a score
//! - `inspect` - Display store statistics
//! - `verify` - Re-hash every block in the data log
//! - `rebuild` - Rebuild the index from the data log
//! - `delete` - Remove a store's files

mod commands;

use clap::{Parser, Subcommand};
use commands::CliError;
use scoredb_core::{Config, ScoreKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ScoreDB command-line store tools.
#[derive(Parser)]
#[command(name = "scoredb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the store files
    #[arg(global = true, short, long, default_value = ".")]
    dir: PathBuf,

    /// Digest scheme (md5, xxh64)
    #[arg(global = true, short, long, default_value = "md5")]
    kind: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store
    New {
        /// Store name (random if omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Store a payload and print its score
    Write {
        /// Store name
        name: String,

        /// File to store, or `-` for stdin
        #[arg(default_value = "-")]
        file: String,
    },

    /// Print the payload stored under a score
    Read {
        /// Store name
        name: String,

        /// Score in hex
        score: String,
    },

    /// Display store statistics
    Inspect {
        /// Store name
        name: String,

        /// List every score in the index
        #[arg(short, long)]
        scores: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Re-hash every block in the data log
    Verify {
        /// Store name
        name: String,
    },

    /// Rebuild the index from the data log
    Rebuild {
        /// Store name
        name: String,
    },

    /// Remove a store's files
    Delete {
        /// Store name
        name: String,
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let kind = ScoreKind::from_name(&cli.kind).ok_or_else(|| CliError::UnknownKind(cli.kind.clone()))?;
    let config = Config::new().score_kind(kind);

    match cli.command {
        Commands::New { name } => {
            commands::manage::create(&cli.dir, name.as_deref(), config)?;
        }
        Commands::Write { name, file } => {
            commands::payload::write(&cli.dir, &name, &file, config)?;
        }
        Commands::Read { name, score } => {
            commands::payload::read(&cli.dir, &name, &score, config)?;
        }
        Commands::Inspect {
            name,
            scores,
            format,
        } => {
            commands::inspect::run(&cli.dir, &name, scores, &format, config)?;
        }
        Commands::Verify { name } => {
            commands::verify::run(&cli.dir, &name, config)?;
        }
        Commands::Rebuild { name } => {
            commands::manage::rebuild(&cli.dir, &name, config)?;
        }
        Commands::Delete { name } => {
            commands::manage::delete(&cli.dir, &name, config)?;
        }
        Commands::Version => {
            println!("ScoreDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ScoreDB Core v{}", scoredb_core::VERSION);
        }
    }

    Ok(())
}
