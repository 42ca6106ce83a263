//! Publication gate.
//!
//! Each message maps to exactly one target key, a pure function of the
//! output prefix, workspace, and message id. A metadata-only probe
//! against the store decides whether to write, which makes the store
//! itself the idempotency ledger: reruns over the same records converge
//! to a single write per message.
//!
//! The probe and the write are not atomic (no conditional put), so two
//! concurrent runs over the same workspace can both pass the probe and
//! both write. The content is identical either way, so the race is
//! accepted rather than locked around.

use crate::error::StoreError;
use crate::store::ObjectStore;

/// Content type recorded on published messages.
const EML_CONTENT_TYPE: &str = "message/rfc822";

/// Outcome of one publication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The object was written.
    Created,
    /// The target key already existed; nothing was written.
    Skipped,
    /// Dry run: the key is absent and a real run would have written it.
    WouldCreate,
}

/// Compute the deterministic target key for a message.
pub fn target_key(raw_files_prefix: &str, workspace_id: &str, message_id: &str) -> String {
    format!("{raw_files_prefix}{workspace_id}/gmail/{message_id}.eml")
}

/// Write `content` to `key` unless the key already exists.
///
/// A missing key on the probe is the normal "go ahead" case; any other
/// probe or write failure propagates to the caller.
pub async fn publish(
    store: &dyn ObjectStore,
    key: &str,
    content: &str,
    dry_run: bool,
) -> Result<PublishOutcome, StoreError> {
    if store.head(key).await?.is_some() {
        return Ok(PublishOutcome::Skipped);
    }

    if dry_run {
        return Ok(PublishOutcome::WouldCreate);
    }

    store
        .put(key, content.as_bytes().to_vec(), EML_CONTENT_TYPE)
        .await?;
    Ok(PublishOutcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_target_key_layout() {
        assert_eq!(
            target_key("raw/", "ws_1", "m42"),
            "raw/ws_1/gmail/m42.eml"
        );
    }

    #[tokio::test]
    async fn test_created_then_skipped() {
        let store = MemoryStore::new();
        let key = target_key("raw/", "ws_1", "m1");

        let first = publish(&store, &key, "content", false).await.unwrap();
        assert_eq!(first, PublishOutcome::Created);

        let second = publish(&store, &key, "content", false).await.unwrap();
        assert_eq!(second, PublishOutcome::Skipped);

        // No second write happened.
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.read(&key).unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = MemoryStore::new();
        let key = target_key("raw/", "ws_1", "m1");

        let outcome = publish(&store, &key, "content", true).await.unwrap();
        assert_eq!(outcome, PublishOutcome::WouldCreate);
        assert!(!store.contains(&key));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_reports_existing_as_skipped() {
        let store = MemoryStore::new();
        let key = target_key("raw/", "ws_1", "m1");
        store.insert(&key, b"old".to_vec(), "message/rfc822");

        let outcome = publish(&store, &key, "new", true).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
        assert_eq!(store.read(&key).unwrap(), b"old");
    }
}
