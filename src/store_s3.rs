//! Amazon S3 object store.
//!
//! Implements [`ObjectStore`] against the S3 REST API with AWS
//! Signature V4 authentication: paginated `ListObjectsV2`, streaming
//! `GetObject`, metadata-only `HeadObject` probes, and `PutObject`.
//! Supports custom endpoints for S3-compatible services (MinIO,
//! LocalStack).
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for AWS signing —
//! no C library dependencies like `aws-lc-sys`, making it compatible
//! with all build environments including Nix.
//!
//! # Environment Variables
//!
//! Credentials are read from environment variables:
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (for temporary credentials / IAM roles)
//!
//! # Authentication
//!
//! All requests are signed using
//! [AWS Signature Version 4](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-auth-using-authorization-header.html)
//! with HMAC-SHA256 (`hmac` + `sha2` crates).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::Method;
use sha2::{Digest, Sha256};
use tokio_util::io::StreamReader;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{ByteStream, ListPage, ObjectEntry, ObjectStore};

type HmacSha256 = Hmac<Sha256>;

/// Maximum entries requested per `ListObjectsV2` page.
const MAX_KEYS_PER_PAGE: &str = "1000";

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// S3-backed [`ObjectStore`].
pub struct S3Store {
    config: StoreConfig,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Store {
    /// Create a store for the configured bucket, reading AWS credentials
    /// from the environment.
    pub fn from_env(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            creds: AwsCredentials::from_env()?,
            client: reqwest::Client::new(),
        })
    }

    /// Hostname for the configured bucket and region.
    ///
    /// If a custom `endpoint_url` is set (MinIO, LocalStack, etc.),
    /// that is used instead of `<bucket>.s3.<region>.amazonaws.com`.
    fn host(&self) -> String {
        if let Some(ref endpoint) = self.config.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!(
                "{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            )
        }
    }

    /// Build a SigV4-signed request for `method` against either the
    /// bucket root (listing) or a single object key.
    fn signed_request(
        &self,
        method: Method,
        key: Option<&str>,
        query: &[(String, String)],
        payload: &[u8],
    ) -> reqwest::RequestBuilder {
        let host = self.host();
        let canonical_uri = match key {
            Some(k) => format!("/{}", encode_key(k)),
            None => "/".to_string(),
        };

        // Canonical query string must be sorted.
        let mut sorted_params = query.to_vec();
        sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_querystring: String = sorted_params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(payload);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, canonical_querystring, canonical_headers, signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let url = if canonical_querystring.is_empty() {
            format!("https://{}{}", host, canonical_uri)
        } else {
            format!("https://{}{}?{}", host, canonical_uri, canonical_querystring)
        };

        let mut req = self
            .client
            .request(method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = self.creds.session_token {
            req = req.header("x-amz-security-token", token);
        }

        req
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut query = vec![
            ("list-type".to_string(), "2".to_string()),
            ("max-keys".to_string(), MAX_KEYS_PER_PAGE.to_string()),
        ];
        if !prefix.is_empty() {
            query.push(("prefix".to_string(), prefix.to_string()));
        }
        if let Some(t) = token {
            query.push(("continuation-token".to_string(), t.to_string()));
        }

        let resp = self
            .signed_request(Method::GET, None, &query, b"")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Http {
                op: "LIST",
                key: prefix.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let xml = resp.text().await?;
        Ok(parse_list_page(&xml))
    }

    async fn get(&self, key: &str) -> Result<ByteStream, StoreError> {
        let resp = self
            .signed_request(Method::GET, Some(key), &[], b"")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Http {
                op: "GET",
                key: key.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let stream = resp
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();
        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError> {
        let resp = self
            .signed_request(Method::HEAD, Some(key), &[], b"")
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Http {
                op: "HEAD",
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let header_str = |name| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let size = header_str(CONTENT_LENGTH)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let etag = header_str(ETAG).map(|v| v.trim_matches('"').to_string());
        let last_modified = header_str(LAST_MODIFIED)
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(&v).ok())
            .map(|dt| dt.timestamp());

        Ok(Some(ObjectEntry {
            key: key.to_string(),
            size,
            last_modified,
            etag,
        }))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let resp = self
            .signed_request(Method::PUT, Some(key), &[], &body)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Http {
                op: "PUT",
                key: key.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// URI-encode an object key, preserving `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

// ============ XML Parsing (minimal, no extra deps) ============

/// Parse one `ListObjectsV2` XML response page into a [`ListPage`].
///
/// The continuation token is only surfaced when the listing reports
/// itself truncated.
fn parse_list_page(xml: &str) -> ListPage {
    let is_truncated = extract_xml_value(xml, "IsTruncated")
        .map(|v| v == "true")
        .unwrap_or(false);
    let next_token = if is_truncated {
        extract_xml_value(xml, "NextContinuationToken")
    } else {
        None
    };

    let mut entries = Vec::new();
    let mut remaining = xml;
    while let Some(start) = remaining.find("<Contents>") {
        let block_start = start + "<Contents>".len();
        let Some(end) = remaining[block_start..].find("</Contents>") else {
            break;
        };
        let block = &remaining[block_start..block_start + end];
        remaining = &remaining[block_start + end + "</Contents>".len()..];

        let key = extract_xml_value(block, "Key").unwrap_or_default();
        // Skip directory placeholder entries.
        if key.is_empty() || key.ends_with('/') {
            continue;
        }

        let last_modified = extract_xml_value(block, "LastModified")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.timestamp());

        let etag = extract_xml_value(block, "ETag").map(|v| v.trim_matches('"').to_string());

        let size = extract_xml_value(block, "Size")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        entries.push(ObjectEntry {
            key,
            size,
            last_modified,
            etag,
        });
    }

    ListPage {
        entries,
        next_token,
    }
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    if let Some(start) = xml.find(&open) {
        let value_start = start + open.len();
        if let Some(end) = xml[value_start..].find(&close) {
            return Some(xml[value_start..value_start + end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_page_single_page() {
        let xml = r#"<?xml version="1.0"?>
<ListBucketResult>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>sync/details/ws/conn/0001.jsonl</Key>
    <LastModified>2024-05-01T12:00:00.000Z</LastModified>
    <ETag>"abc123"</ETag>
    <Size>2048</Size>
  </Contents>
  <Contents>
    <Key>sync/details/ws/conn/</Key>
    <Size>0</Size>
  </Contents>
</ListBucketResult>"#;

        let page = parse_list_page(xml);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].key, "sync/details/ws/conn/0001.jsonl");
        assert_eq!(page.entries[0].size, 2048);
        assert_eq!(page.entries[0].etag.as_deref(), Some("abc123"));
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_parse_list_page_truncated() {
        let xml = r#"<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>token-1</NextContinuationToken>
  <Contents><Key>a.jsonl</Key><Size>1</Size></Contents>
</ListBucketResult>"#;

        let page = parse_list_page(xml);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("token-1"));
    }

    #[test]
    fn test_uri_encode_preserves_unreserved() {
        assert_eq!(uri_encode("abc-123_.~"), "abc-123_.~");
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_encode_key_keeps_separators() {
        assert_eq!(encode_key("raw/ws 1/m.eml"), "raw/ws%201/m.eml");
    }

    #[test]
    fn test_derive_signing_key_is_deterministic() {
        let a = derive_signing_key("secret", "20240501", "us-east-1", "s3");
        let b = derive_signing_key("secret", "20240501", "us-east-1", "s3");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}
