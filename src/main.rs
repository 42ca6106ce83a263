//! # mailvault CLI
//!
//! Archives mailbox sync exports as `.eml` files in object storage.
//!
//! ## Usage
//!
//! ```bash
//! mailvault --config ./config/mailvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mailvault process` | Convert unprocessed sync records into archived `.eml` files |
//! | `mailvault files` | List the record files a processing run would consume |
//!
//! ## Examples
//!
//! ```bash
//! # Preview what a run would create, without writing anything
//! mailvault process --dry-run
//!
//! # Archive at most 500 records
//! mailvault process --limit 500
//!
//! # Show the discovered record files for this workspace
//! mailvault files
//! ```
//!
//! AWS credentials are read from `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, and optionally `AWS_SESSION_TOKEN`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mailvault::config;
use mailvault::ingest::{self, RunOptions};
use mailvault::records;
use mailvault::store_s3::S3Store;

/// mailvault — archive mailbox sync exports as RFC 822 `.eml` files in
/// object storage.
#[derive(Parser)]
#[command(
    name = "mailvault",
    about = "Archive mailbox sync exports as RFC 822 .eml files in object storage",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mailvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Convert unprocessed sync records into archived .eml files.
    ///
    /// Discovers the workspace's record files, extracts a message from
    /// each record, and writes it under its deterministic key unless
    /// that key already exists. Safe to re-run: already-archived
    /// messages are skipped.
    Process {
        /// Maximum number of records to process in this run.
        #[arg(long)]
        limit: Option<u64>,

        /// Probe and report without writing any objects.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the record files a processing run would consume.
    Files,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let store = S3Store::from_env(&cfg.store)?;

    match cli.command {
        Commands::Process { limit, dry_run } => {
            let counters =
                ingest::process_messages(&store, &cfg, RunOptions { limit, dry_run }).await?;

            if dry_run {
                println!("process (dry-run)");
            } else {
                println!("process");
            }
            println!("  processed: {}", counters.processed);
            println!("  created:   {}", counters.created);
            println!("  skipped:   {}", counters.skipped);
            println!("  failed:    {}", counters.failed);
            println!("ok");
        }
        Commands::Files => {
            let prefix = cfg.details_prefix();
            let keys = records::list_record_keys(&store, &prefix).await?;
            for key in &keys {
                println!("{}", key);
            }
            println!("{} record file(s) under '{}'", keys.len(), prefix);
        }
    }

    Ok(())
}
