//! Typed errors for the archival pipeline.
//!
//! Each concern gets its own error type so the orchestrator can decide
//! what is fatal for the run (listing failures) and what is only fatal
//! for one record (everything else). All per-record errors end up as a
//! `failed` counter increment plus a log line.

use thiserror::Error;

/// Failure while decoding a base64url-encoded message body.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The data is not valid URL-safe base64.
    #[error("invalid base64url data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not valid UTF-8.
    #[error("decoded body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure while extracting a message from one sync record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The record (after envelope unwrapping) carries no message id.
    #[error("record has no message id")]
    MissingId,

    /// No part anywhere in the payload tree carries decodable body data.
    #[error("no decodable body part in message '{id}'")]
    NoBodyFound { id: String },

    /// The selected part's body data could not be decoded.
    #[error("failed to decode body of message '{id}': {source}")]
    Decode {
        id: String,
        #[source]
        source: DecodeError,
    },
}

/// Failure talking to the object store.
///
/// A missing key on an existence probe is *not* an error — `head`
/// returns `Ok(None)` for that case.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("object store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("object store returned HTTP {status} for {op} '{key}'")]
    Http {
        op: &'static str,
        key: String,
        status: u16,
    },

    /// Reading an object's byte stream failed partway through.
    #[error("failed to read object '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
