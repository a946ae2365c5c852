//! # Readiness Feed CLI (`feed`)
//!
//! ## Usage
//!
//! ```bash
//! feed --config ./config/feed.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `feed init` | Create the database and cache/log tables |
//! | `feed ingest` | Replace the chunk table from the export folder |
//! | `feed fetch` | Print the payload JSON (cached) |
//! | `feed classify <name>...` | Show which rule each filename resolves to |
//! | `feed rules` | List the classification table |
//! | `feed status` | Table, cache and access-log overview |
//! | `feed log` | Newest access-log records |
//! | `feed serve` | Start the HTTP server |
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG` to adjust.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use readiness_feed::classify::classify;
use readiness_feed::rules::RULES;
use readiness_feed::{config, fetch, ingest, migrate, server, status};

/// Readiness Feed CLI — ingest a roster/readiness export folder and serve
/// the reassembled payload.
#[derive(Parser)]
#[command(
    name = "feed",
    about = "Readiness Feed — chunked ingestion and cached payload serving for roster exports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/feed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file plus the cache and access-log tables. The
    /// chunk table appears with the first successful ingest. Idempotent.
    Init,

    /// Run one ingestion: invalidate the cached payload, classify and chunk
    /// every export file, and replace the chunk table in one transaction.
    Ingest {
        /// Report matched files and row counts without touching cache or store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the payload JSON, from cache when live.
    Fetch,

    /// Show which classification rule each filename resolves to.
    Classify {
        /// Filenames to classify.
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List the classification table in scan order.
    Rules,

    /// Show chunk table, cache and access-log state.
    Status,

    /// Show the newest access-log records.
    Log {
        /// Number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Classify { names } => {
            for name in names {
                match classify(name) {
                    Some(rule) => println!(
                        "{:<40} {:<28} priority {}",
                        name,
                        rule.compound_key(),
                        rule.priority
                    ),
                    None => println!("{:<40} (no match)", name),
                }
            }
            return Ok(());
        }
        Commands::Rules => {
            println!("{:>8}  {:<24} {:<30} EXCLUDES", "PRIORITY", "TOKEN", "KEY");
            for rule in RULES {
                println!(
                    "{:>8}  {:<24} {:<30} {}",
                    rule.priority,
                    rule.match_token,
                    rule.compound_key(),
                    rule.exclude_tokens.join(", ")
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run } => {
            ingest::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Fetch => {
            fetch::run_fetch(&cfg).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Log { limit } => {
            status::run_log(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Classify { .. } | Commands::Rules => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
