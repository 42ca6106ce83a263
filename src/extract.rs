//! Message extraction from sync records.
//!
//! A record line is either the Gmail message itself or the message
//! wrapped in one envelope level (`_airbyte_data`, then `data`). The
//! message payload is a recursive tree of MIME-like parts; extraction
//! walks it depth-first looking for a body-bearing leaf, preferring
//! `text/html` over `text/plain` at every level of the tree.

use serde::Deserialize;
use serde_json::Value;

use crate::decode::decode_body;
use crate::error::ExtractError;
use crate::message::{BodyMime, ExtractedMessage};

/// Envelope fields checked, in order, before falling back to the record
/// itself. Only one level of unwrapping is performed.
const ENVELOPE_FIELDS: [&str; 2] = ["_airbyte_data", "data"];

/// Nesting bound for part trees. Real messages nest a handful of
/// levels; anything deeper is treated as having no body.
const MAX_PART_DEPTH: usize = 64;

/// One node of the message part tree.
///
/// Unknown fields (partId, filename, attachment metadata, ...) are
/// ignored; only the fields extraction needs are modeled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Only present on the root part.
    #[serde(default)]
    pub headers: Option<Vec<Header>>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

/// One `name: value` header pair.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Inline body descriptor on a leaf part. Either field may be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub size: Option<i64>,
    /// base64url-encoded content.
    #[serde(default)]
    pub data: Option<String>,
}

/// Unwrap the envelope around a record, if any.
///
/// The first envelope field present wins; envelope contents are never
/// unwrapped again.
pub fn unwrap_envelope(record: &Value) -> &Value {
    ENVELOPE_FIELDS
        .iter()
        .find_map(|field| record.get(field))
        .unwrap_or(record)
}

/// Best-effort message id for log lines, without full extraction.
pub fn record_id(record: &Value) -> Option<&str> {
    unwrap_envelope(record).get("id").and_then(Value::as_str)
}

/// Extract a normalized message from one parsed record.
pub fn extract(record: &Value) -> Result<ExtractedMessage, ExtractError> {
    let core = unwrap_envelope(record);

    let id = core
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ExtractError::MissingId)?
        .to_string();

    let payload: MessagePart = match core.get("payload") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| ExtractError::NoBodyFound { id: id.clone() })?,
        None => return Err(ExtractError::NoBodyFound { id }),
    };

    let part = find_body_part(&payload, true, 0)
        .ok_or_else(|| ExtractError::NoBodyFound { id: id.clone() })?;

    // find_body_part only returns parts with data present.
    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .unwrap_or_default();
    let body = decode_body(data).map_err(|source| ExtractError::Decode {
        id: id.clone(),
        source,
    })?;

    let body_mime = if part
        .mime_type
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().contains("html"))
    {
        BodyMime::Html
    } else {
        BodyMime::Plain
    };

    let headers = payload.headers.as_deref().unwrap_or(&[]);
    // The preview lives on the original record, not the unwrapped core.
    let snippet = record
        .get("snippet")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ExtractedMessage {
        id,
        subject: header_value(headers, "Subject"),
        from: header_value(headers, "From"),
        to: header_value(headers, "To"),
        cc: header_value(headers, "Cc"),
        bcc: header_value(headers, "Bcc"),
        date: header_value(headers, "Date"),
        body_mime,
        body,
        snippet,
    })
}

/// Case-insensitive header lookup; the first match wins.
fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn has_body_data(part: &MessagePart) -> bool {
    part.body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .is_some_and(|d| !d.is_empty())
}

fn mime_is(part: &MessagePart, mime: &str) -> bool {
    part.mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case(mime))
}

fn is_multipart(part: &MessagePart) -> bool {
    part.mime_type
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().starts_with("multipart/"))
}

/// Depth-first search for the part whose body to use.
///
/// A non-multipart part carrying its own body data wins immediately,
/// before children are considered. Otherwise direct children are
/// scanned for an HTML part (when preferred), then for a plain-text
/// part, and only then does the search descend — so the preference is
/// re-applied at every level and a nested HTML part can beat a deeper
/// plain-text cousin.
fn find_body_part<'a>(
    part: &'a MessagePart,
    prefer_html: bool,
    depth: usize,
) -> Option<&'a MessagePart> {
    if depth > MAX_PART_DEPTH {
        return None;
    }

    if !is_multipart(part) && has_body_data(part) {
        return Some(part);
    }

    let children = part.parts.as_deref().unwrap_or(&[]);

    if prefer_html {
        if let Some(child) = children
            .iter()
            .find(|c| mime_is(c, "text/html") && has_body_data(c))
        {
            return Some(child);
        }
    }

    if let Some(child) = children
        .iter()
        .find(|c| mime_is(c, "text/plain") && has_body_data(c))
    {
        return Some(child);
    }

    children
        .iter()
        .find_map(|child| find_body_part(child, prefer_html, depth + 1))
}
