//! Object store capability interface.
//!
//! Everything the pipeline needs from durable storage is expressed as
//! the [`ObjectStore`] trait: paginated listing, streaming reads, a
//! metadata-only existence probe, and writes. The S3 implementation
//! lives in [`crate::store_s3`]; [`MemoryStore`] here backs the test
//! suite and local experiments.
//!
//! Timeouts and retries are the store client's concern — callers treat
//! each operation as a single blocking-until-resolved call.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use crate::error::StoreError;

/// Readable byte stream over one object's content.
pub type ByteStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Full object key (path within the bucket).
    pub key: String,
    /// Object size in bytes.
    pub size: i64,
    /// Last modification timestamp (Unix epoch seconds), when known.
    pub last_modified: Option<i64>,
    /// Entity tag (content hash), stripped of surrounding quotes.
    pub etag: Option<String>,
}

/// One page of a prefix listing.
///
/// A `Some` continuation token means more entries remain; pass it back
/// to [`ObjectStore::list_page`] to fetch the next page.
#[derive(Debug, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_token: Option<String>,
}

/// Durable object storage as seen by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects under `prefix`, continuing from `token`.
    async fn list_page(&self, prefix: &str, token: Option<&str>)
        -> Result<ListPage, StoreError>;

    /// Open an object for streaming reads.
    async fn get(&self, key: &str) -> Result<ByteStream, StoreError>;

    /// Metadata-only existence probe. `Ok(None)` means the key does not
    /// exist — that is a normal outcome, not an error.
    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError>;

    /// Write an object.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), StoreError>;
}

/// In-memory object store.
///
/// Backs the integration tests and is handy for local dry runs. Keys
/// are kept sorted so listings come back in the same order an S3
/// listing would. The page size is configurable so tests can exercise
/// continuation-token handling.
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    page_size: usize,
    put_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// Create a store that returns at most `page_size` entries per
    /// listing page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            put_count: AtomicU64::new(0),
        }
    }

    /// Seed an object without counting it as a pipeline write.
    pub fn insert(&self, key: &str, body: impl Into<Vec<u8>>, content_type: &str) {
        self.lock()
            .insert(key.to_string(), (body.into(), content_type.to_string()));
    }

    /// Whether `key` currently exists.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Read an object's content, if present.
    pub fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).map(|(body, _)| body.clone())
    }

    /// Number of writes performed through [`ObjectStore::put`].
    pub fn put_count(&self) -> u64 {
        self.put_count.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, (Vec<u8>, String)>> {
        self.objects.lock().expect("store mutex poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let objects = self.lock();
        let matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            // Resume after the last key of the previous page.
            .filter(|(key, _)| token.map_or(true, |t| key.as_str() > t));

        let mut entries = Vec::new();
        let mut next_token = None;
        for (key, (body, _)) in matching {
            if entries.len() == self.page_size {
                next_token = entries.last().map(|e: &ObjectEntry| e.key.clone());
                break;
            }
            entries.push(ObjectEntry {
                key: key.clone(),
                size: body.len() as i64,
                last_modified: None,
                etag: None,
            });
        }
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    async fn get(&self, key: &str) -> Result<ByteStream, StoreError> {
        let body = self.read(key).ok_or(StoreError::Http {
            op: "GET",
            key: key.to_string(),
            status: 404,
        })?;
        Ok(Box::new(Cursor::new(body)))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError> {
        Ok(self.lock().get(key).map(|(body, _)| ObjectEntry {
            key: key.to_string(),
            size: body.len() as i64,
            last_modified: None,
            etag: None,
        }))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        self.lock()
            .insert(key.to_string(), (body, content_type.to_string()));
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
