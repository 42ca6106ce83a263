//! Line-delimited record access.
//!
//! Sync exports land in the object store as `.jsonl` files, one JSON
//! record per line. Listing is bounded (all keys are collected up
//! front, following pagination); reading is not — [`RecordStream`]
//! pulls one line at a time from the object's byte stream, so files of
//! any size are processed with bounded memory.

use serde_json::Value;
use tokio::io::AsyncBufReadExt;

use crate::error::StoreError;
use crate::store::{ByteStream, ObjectStore};

/// File extension for line-delimited record files.
const RECORD_EXT: &str = ".jsonl";

/// List every record-file key under `prefix`, following listing
/// continuation tokens until the store reports no more pages.
///
/// Keys that do not end in `.jsonl` are ignored. The returned order is
/// the store's listing order, which fixes the processing order for the
/// whole run.
pub async fn list_record_keys(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = store.list_page(prefix, token.as_deref()).await?;
        keys.extend(
            page.entries
                .into_iter()
                .map(|e| e.key)
                .filter(|k| k.ends_with(RECORD_EXT)),
        );
        match page.next_token {
            Some(t) => token = Some(t),
            None => break,
        }
    }

    Ok(keys)
}

/// Open `key` for lazy record-by-record reading.
pub async fn open_records(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<RecordStream, StoreError> {
    let stream = store.get(key).await?;
    Ok(RecordStream {
        key: key.to_string(),
        lines: stream.lines(),
    })
}

/// Single-pass reader over one record file.
///
/// Lines are split on `\n` (a trailing `\r` is stripped, so CRLF files
/// work too) with no line-length cap. Blank and whitespace-only lines
/// are ignored. A line that is not valid JSON logs a warning naming the
/// file and is skipped — malformed lines never abort the stream.
pub struct RecordStream {
    key: String,
    lines: tokio::io::Lines<ByteStream>,
}

impl RecordStream {
    /// Next parsed record, or `Ok(None)` at end of file.
    pub async fn next_record(&mut self) -> Result<Option<Value>, StoreError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|source| StoreError::Read {
                    key: self.key.clone(),
                    source,
                })?;

            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    eprintln!("Warning: {}: skipping malformed line: {}", self.key, e);
                }
            }
        }
    }

    /// Key of the file this stream reads from.
    pub fn key(&self) -> &str {
        &self.key
    }
}
