//! Pipeline orchestration.
//!
//! Coordinates one archival run: record-file listing → per-line record
//! streaming → extraction → RFC 822 rendering → existence-gated
//! publication. Files are processed strictly in listing order and
//! records in line order on a single logical thread; the only run-wide
//! mutable state is the [`Counters`] tally.
//!
//! Per-record failures are caught here, logged with the file key and
//! message id when known, and downgraded to a `failed` count — one bad
//! record never aborts a run. Only a failure to list the record files
//! (or to load configuration, one level up) is fatal.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::extract;
use crate::publish::{self, PublishOutcome};
use crate::records;
use crate::store::ObjectStore;

/// Per-run tallies. Every record that reaches an attempt increments
/// `processed` and then exactly one of the other three.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub processed: u64,
    pub created: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Knobs for one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOptions {
    /// Stop once this many records have been processed.
    pub limit: Option<u64>,
    /// Probe and tally without writing any objects.
    pub dry_run: bool,
}

/// Run the full pipeline over every unprocessed record under the
/// workspace's details prefix.
///
/// Dry runs count a would-be write as `created` so the summary previews
/// what a real run would create.
pub async fn process_messages(
    store: &dyn ObjectStore,
    config: &Config,
    opts: RunOptions,
) -> Result<Counters> {
    let prefix = config.details_prefix();
    let keys = records::list_record_keys(store, &prefix)
        .await
        .with_context(|| format!("failed to list record files under '{}'", prefix))?;

    let mut counters = Counters::default();

    for key in &keys {
        if let Some(limit) = opts.limit {
            if counters.processed >= limit {
                return Ok(counters);
            }
        }

        let mut stream = match records::open_records(store, key).await {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("Warning: failed to open record file '{}': {}", key, e);
                continue;
            }
        };

        loop {
            // Limit check happens before the record is even pulled, so a
            // reached limit causes no further store reads.
            if let Some(limit) = opts.limit {
                if counters.processed >= limit {
                    return Ok(counters);
                }
            }

            let record = match stream.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Warning: giving up on record file '{}': {}", key, e);
                    break;
                }
            };

            counters.processed += 1;
            match publish_record(store, config, &record, opts.dry_run).await {
                Ok(PublishOutcome::Created) | Ok(PublishOutcome::WouldCreate) => {
                    counters.created += 1;
                }
                Ok(PublishOutcome::Skipped) => counters.skipped += 1,
                Err(e) => {
                    let id = extract::record_id(&record).unwrap_or("<unknown>");
                    eprintln!("Error: {}: message '{}': {:#}", key, id, e);
                    counters.failed += 1;
                }
            }
        }
    }

    Ok(counters)
}

/// Extract → render → gate for a single record.
async fn publish_record(
    store: &dyn ObjectStore,
    config: &Config,
    record: &Value,
    dry_run: bool,
) -> Result<PublishOutcome> {
    let message = extract::extract(record)?;
    let eml = message.to_eml();
    let key = publish::target_key(
        &config.layout.raw_files_prefix,
        &config.workspace.workspace_id,
        &message.id,
    );
    let outcome = publish::publish(store, &key, &eml, dry_run)
        .await
        .with_context(|| format!("failed to publish '{}'", key))?;
    Ok(outcome)
}
