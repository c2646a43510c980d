//! # Bibliotech ingest CLI (`biblio`)
//!
//! The `biblio` binary drives catalog ingestion for the Bibliotech library:
//! schema setup, source listing, ingestion runs, and maintenance passes over
//! stored books.
//!
//! ## Usage
//!
//! ```bash
//! biblio --config ./config/biblio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `biblio init` | Create the local SQLite schema |
//! | `biblio sources` | List catalog sources and their settings |
//! | `biblio ingest <source> [count\|all]` | Ingest books from a catalog |
//! | `biblio reclassify` | Re-run classification over stored books |
//! | `biblio link-curators [count\|all]` | Link unlinked books to curators |
//!
//! ## Examples
//!
//! ```bash
//! # First 200 Gutenberg books, without writing anything
//! biblio ingest gutenberg 200 --dry-run
//!
//! # Every Wikibooks page
//! biblio ingest wikibooks all
//!
//! # Propose new codes for books still in general works
//! biblio reclassify --prefix 000 --dry-run
//! ```
//!
//! Credentials come from the environment (`BIBLIO_STORE_URL`,
//! `BIBLIO_STORE_KEY`, `BIBLIO_CLASSIFIER_*`). A missing credential exits
//! non-zero before any record is processed.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bibliotech_ingest::models::Source;
use bibliotech_ingest::progress::ProgressMode;
use bibliotech_ingest::reclassify::ReclassifyOptions;
use bibliotech_ingest::{config, ingest, link_curators, migrate, reclassify, sources};

/// Bibliotech catalog ingestion and classification pipeline.
#[derive(Parser)]
#[command(
    name = "biblio",
    about = "Bibliotech catalog ingestion and classification pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/biblio.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/biblio.toml")]
    config: PathBuf,

    /// Progress output on stderr: `human`, `json`, or `off`.
    /// Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_parser = ["human", "json", "off"])]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the local SQLite schema.
    ///
    /// Creates the books and curators tables. Idempotent.
    Init,

    /// List catalog sources with their endpoint, default code and batch size.
    Sources,

    /// Ingest books from a catalog source.
    ///
    /// Fetches, filters, classifies, links curators and upserts. Per-item
    /// failures are logged and counted; the run still exits zero.
    Ingest {
        /// Catalog to ingest: `gutenberg` or `wikibooks`.
        source: String,

        /// How many records to ingest, or `all` (default).
        count: Option<String>,

        /// Report would-be inserts and updates without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-run classification over stored books.
    ///
    /// Prints `uri: old -> new` for every changed code.
    Reclassify {
        /// Only books whose code starts with this prefix (e.g. `000`).
        #[arg(long)]
        prefix: Option<String>,

        /// Only books from this source.
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of books to examine.
        #[arg(long)]
        limit: Option<usize>,

        /// Report changes without writing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Link stored books without a curator to their best-matching curator.
    LinkCurators {
        /// How many books to examine, or `all` (default).
        count: Option<String>,

        /// Report links without writing them.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Parse the optional `count|all` positional.
fn parse_count(count: Option<&str>) -> Result<Option<usize>> {
    match count.map(str::trim) {
        None => Ok(None),
        Some(c) if c.eq_ignore_ascii_case("all") => Ok(None),
        Some(c) => match c.parse::<usize>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("Invalid count: '{}'. Use a number or 'all'.", c),
        },
    }
}

fn progress_mode(flag: Option<&str>) -> ProgressMode {
    match flag {
        Some("json") => ProgressMode::Json,
        Some("off") => ProgressMode::Off,
        Some(_) => ProgressMode::Human,
        None => ProgressMode::default_for_tty(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = progress_mode(cli.progress.as_deref());

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Ingest {
            source,
            count,
            dry_run,
        } => {
            let limit = parse_count(count.as_deref())?;
            ingest::run_ingest(&cfg, &source, limit, dry_run, progress).await?;
        }
        Commands::Reclassify {
            prefix,
            source,
            limit,
            dry_run,
        } => {
            let source = match source {
                Some(s) => Some(s.parse::<Source>().map_err(anyhow::Error::msg)?),
                None => None,
            };
            let options = ReclassifyOptions {
                prefix,
                source,
                limit,
                dry_run,
            };
            reclassify::run_reclassify(&cfg, options).await?;
        }
        Commands::LinkCurators { count, dry_run } => {
            let limit = parse_count(count.as_deref())?;
            link_curators::run_link_curators(&cfg, limit, dry_run).await?;
        }
    }

    Ok(())
}
