//! # Context Spans CLI (`cspan`)
//!
//! ## Usage
//!
//! ```bash
//! cspan --config ./config/cspan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cspan init` | Create the SQLite database and its tables |
//! | `cspan load <file.json>` | Materialize annotated documents and their n-gram spans |
//! | `cspan get <stable_id>` | Resolve a stable id to its stored context |
//! | `cspan delete <name>` | Delete a document and everything it owns |
//! | `cspan stats` | Row counts per kind and database size |
//!
//! ## Examples
//!
//! ```bash
//! cspan init --config ./config/cspan.toml
//! cspan load ./docs.json --ngrams 2
//! cspan get "report-1::span:4:6"
//! cspan delete report-1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use context_spans::{config, delete, get, ingest, logging, migrate, stats};

/// Context Spans CLI — stable-id addressed document hierarchies and spans.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "cspan",
    about = "Context Spans — persist document hierarchies and candidate spans by stable id",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cspan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all context tables. Running it
    /// more than once is safe.
    Init,

    /// Load annotated documents from a JSON file.
    ///
    /// Materializes each document's sentences, tables, cells and phrases,
    /// then every distinct n-gram span over the tokenized ones. Contexts
    /// that already exist are reused, so reloading inserts nothing.
    Load {
        /// Path to a JSON array of documents.
        path: PathBuf,

        /// Longest n-gram to generate (overrides `[extract].max_ngrams`).
        /// `0` skips span generation.
        #[arg(long)]
        ngrams: Option<usize>,

        /// Print every materialized span (id, stable id, text, lemmas).
        #[arg(long)]
        print_spans: bool,
    },

    /// Look up a context by stable id.
    Get {
        /// Stable id, e.g. `report-1::sentence:0:10`.
        stable_id: String,
    },

    /// Delete a document and every context it owns.
    Delete {
        /// Document name.
        name: String,
    },

    /// Show database statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load {
            path,
            ngrams,
            print_spans,
        } => {
            ingest::run_load(&cfg, &path, ngrams, print_spans).await?;
        }
        Commands::Get { stable_id } => {
            get::run_get(&cfg, &stable_id).await?;
        }
        Commands::Delete { name } => {
            delete::run_delete(&cfg, &name).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
