//! End-to-end pipeline tests.
//!
//! These drive the full listing → streaming → extraction → publication
//! flow through `process_messages` against the in-memory object store,
//! covering idempotence, limit enforcement, dry runs, and per-record
//! failure isolation.

use mailvault::config::{Config, LayoutConfig, StoreConfig, WorkspaceConfig};
use mailvault::ingest::{process_messages, RunOptions};
use mailvault::store::MemoryStore;

// "hello" in base64url.
const HELLO: &str = "aGVsbG8";

fn test_config() -> Config {
    Config {
        store: StoreConfig {
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
        },
        workspace: WorkspaceConfig {
            workspace_id: "ws_1".to_string(),
            connector_id: "conn_a".to_string(),
        },
        layout: LayoutConfig {
            details_prefix: "sync/details/".to_string(),
            raw_files_prefix: "raw_files/".to_string(),
        },
    }
}

fn record_line(id: &str, subject: &str, data: &str) -> String {
    format!(
        "{{\"_airbyte_data\":{{\"id\":\"{id}\",\"payload\":{{\
         \"headers\":[{{\"name\":\"Subject\",\"value\":\"{subject}\"}}],\
         \"parts\":[{{\"mimeType\":\"text/plain\",\"body\":{{\"data\":\"{data}\"}}}}]}}}}}}\n"
    )
}

fn seed_records(store: &MemoryStore, config: &Config, file: &str, lines: &[String]) {
    let key = format!("{}{}", config.details_prefix(), file);
    store.insert(&key, lines.concat().into_bytes(), "application/jsonl");
}

fn eml_key(config: &Config, id: &str) -> String {
    format!(
        "{}{}/gmail/{}.eml",
        config.layout.raw_files_prefix, config.workspace.workspace_id, id
    )
}

#[tokio::test]
async fn test_full_run_archives_every_record() {
    let store = MemoryStore::new();
    let config = test_config();
    seed_records(
        &store,
        &config,
        "0001.jsonl",
        &[record_line("m1", "Hi", HELLO), record_line("m2", "Re", HELLO)],
    );
    seed_records(
        &store,
        &config,
        "0002.jsonl",
        &[record_line("m3", "Fwd", HELLO)],
    );

    let counters = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(counters.processed, 3);
    assert_eq!(counters.created, 3);
    assert_eq!(counters.skipped, 0);
    assert_eq!(counters.failed, 0);

    let eml = String::from_utf8(store.read(&eml_key(&config, "m1")).unwrap()).unwrap();
    assert!(eml.contains("Subject: Hi\r\n"));
    assert!(eml.contains("Message-ID: <m1@gmail>\r\n"));
    assert!(eml.contains("Content-Type: text/plain; charset=\"UTF-8\""));
    assert!(eml.ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let store = MemoryStore::new();
    let config = test_config();
    seed_records(
        &store,
        &config,
        "0001.jsonl",
        &[
            record_line("m1", "a", HELLO),
            record_line("m2", "b", HELLO),
            record_line("m3", "c", HELLO),
        ],
    );

    let first = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.created, 3);

    let second = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();
    assert_eq!(second.processed, 3);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 3);

    // The store saw exactly one write per message across both runs.
    assert_eq!(store.put_count(), 3);
}

#[tokio::test]
async fn test_limit_stops_processing_early() {
    let store = MemoryStore::new();
    let config = test_config();
    let lines: Vec<String> = (0..20)
        .map(|i| record_line(&format!("m{i:02}"), "s", HELLO))
        .collect();
    seed_records(&store, &config, "0001.jsonl", &lines);

    let counters = process_messages(
        &store,
        &config,
        RunOptions {
            limit: Some(5),
            dry_run: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(counters.processed, 5);
    assert_eq!(counters.created, 5);
    assert_eq!(store.put_count(), 5);
}

#[tokio::test]
async fn test_malformed_line_does_not_abort_run() {
    let store = MemoryStore::new();
    let config = test_config();
    let mut lines: Vec<String> = (0..10)
        .map(|i| record_line(&format!("m{i}"), "s", HELLO))
        .collect();
    lines.insert(4, "{this is not valid json\n".to_string());
    seed_records(&store, &config, "0001.jsonl", &lines);

    let counters = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();

    // The malformed line is skipped at the parse stage; it is not a
    // processed record and not a failure.
    assert_eq!(counters.processed, 10);
    assert_eq!(counters.created, 10);
    assert_eq!(counters.failed, 0);
}

#[tokio::test]
async fn test_bad_records_counted_failed_and_run_continues() {
    let store = MemoryStore::new();
    let config = test_config();
    let lines = vec![
        record_line("m1", "ok", HELLO),
        // No id anywhere.
        "{\"_airbyte_data\":{\"payload\":{\"mimeType\":\"text/plain\",\"body\":{\"data\":\"aGVsbG8\"}}}}\n"
            .to_string(),
        // Undecodable body.
        record_line("m3", "bad-body", "%%%%"),
        record_line("m4", "ok", HELLO),
    ];
    seed_records(&store, &config, "0001.jsonl", &lines);

    let counters = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(counters.processed, 4);
    assert_eq!(counters.created, 2);
    assert_eq!(counters.failed, 2);
    assert!(store.contains(&eml_key(&config, "m1")));
    assert!(store.contains(&eml_key(&config, "m4")));
}

#[tokio::test]
async fn test_dry_run_counts_creates_but_writes_nothing() {
    let store = MemoryStore::new();
    let config = test_config();
    seed_records(
        &store,
        &config,
        "0001.jsonl",
        &[record_line("m1", "a", HELLO), record_line("m2", "b", HELLO)],
    );
    // m2 was archived by an earlier run.
    store.insert(&eml_key(&config, "m2"), b"existing".to_vec(), "message/rfc822");

    let counters = process_messages(
        &store,
        &config,
        RunOptions {
            limit: None,
            dry_run: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(counters.processed, 2);
    assert_eq!(counters.created, 1);
    assert_eq!(counters.skipped, 1);
    assert_eq!(store.put_count(), 0);
    assert!(!store.contains(&eml_key(&config, "m1")));
}

#[tokio::test]
async fn test_non_record_files_are_ignored() {
    let store = MemoryStore::new();
    let config = test_config();
    seed_records(
        &store,
        &config,
        "0001.jsonl",
        &[record_line("m1", "a", HELLO)],
    );
    store.insert(
        &format!("{}state.json", config.details_prefix()),
        b"{\"cursor\":42}".to_vec(),
        "application/json",
    );

    let counters = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(counters.processed, 1);
}

#[tokio::test]
async fn test_listing_pagination_is_followed() {
    let store = MemoryStore::with_page_size(2);
    let config = test_config();
    for i in 0..5 {
        seed_records(
            &store,
            &config,
            &format!("{i:04}.jsonl"),
            &[record_line(&format!("m{i}"), "s", HELLO)],
        );
    }

    let counters = process_messages(&store, &config, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(counters.processed, 5);
    assert_eq!(counters.created, 5);
}
