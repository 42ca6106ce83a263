//! # mailvault
//!
//! A batch pipeline that archives mailbox sync exports as RFC 822
//! `.eml` files in object storage.
//!
//! Sync connectors drop Gmail messages into an object store as
//! line-delimited JSON files, each record optionally wrapped in an
//! Airbyte-style envelope. mailvault discovers those files, extracts a
//! normalized message from each record (recursively selecting the best
//! body part and decoding its base64url content), renders it as a flat
//! RFC 822 document, and writes it under a deterministic key — skipping
//! any message whose target key already exists, so repeated runs never
//! produce duplicates.
//!
//! ## Data flow
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────┐
//! │ Record files │──▶│  Extractor  │──▶│ Renderer  │──▶│ Publish  │
//! │ (.jsonl, S3) │   │ parts+b64url│   │ (RFC 822) │   │  gate    │
//! └──────────────┘   └─────────────┘   └───────────┘   └────┬─────┘
//!                                                           │ head-then-put
//!                                                           ▼
//!                                                   s3://{raw_files}/...
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed error taxonomy |
//! | [`decode`] | base64url body decoding |
//! | [`store`] | Object store trait + in-memory implementation |
//! | [`store_s3`] | Amazon S3 object store (SigV4) |
//! | [`records`] | Record-file listing and lazy line streaming |
//! | [`extract`] | Envelope unwrapping and body part selection |
//! | [`message`] | Normalized message and `.eml` rendering |
//! | [`publish`] | Deterministic keys and existence-gated writes |
//! | [`ingest`] | Run orchestration and counters |

pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod message;
pub mod publish;
pub mod records;
pub mod store;
pub mod store_s3;
