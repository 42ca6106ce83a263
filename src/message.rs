//! Normalized message representation and RFC 822 rendering.

/// Body representation selected from the payload part tree.
///
/// Exactly two kinds are supported; the extractor maps anything whose
/// type mentions "html" to [`BodyMime::Html`] and everything else to
/// [`BodyMime::Plain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMime {
    Plain,
    Html,
}

impl BodyMime {
    /// MIME type string used in the `Content-Type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyMime::Plain => "text/plain",
            BodyMime::Html => "text/html",
        }
    }
}

/// A message extracted from one sync record.
///
/// The id is always non-empty and the body is always decoded text,
/// never base64.
#[derive(Debug, Clone)]
pub struct ExtractedMessage {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub date: Option<String>,
    pub body_mime: BodyMime,
    pub body: String,
    /// Short preview carried over from the record, when present.
    pub snippet: Option<String>,
}

impl ExtractedMessage {
    /// Render the message as an RFC 822 `.eml` document.
    ///
    /// Optional headers appear in a fixed order and only when non-empty,
    /// followed by a synthesized `Message-ID` and the protocol headers.
    /// Header lines are CRLF-joined; a blank line separates the header
    /// block from the body, which is emitted verbatim with no
    /// re-encoding or wrapping.
    pub fn to_eml(&self) -> String {
        let mut headers = Vec::new();
        let optional = [
            ("From", &self.from),
            ("To", &self.to),
            ("Cc", &self.cc),
            ("Bcc", &self.bcc),
            ("Subject", &self.subject),
            ("Date", &self.date),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                if !value.is_empty() {
                    headers.push(format!("{}: {}", name, value));
                }
            }
        }

        headers.push(format!("Message-ID: <{}@gmail>", self.id));
        headers.push("MIME-Version: 1.0".to_string());
        headers.push(format!(
            "Content-Type: {}; charset=\"UTF-8\"",
            self.body_mime.as_str()
        ));

        format!("{}\r\n\r\n{}", headers.join("\r\n"), self.body)
    }
}
