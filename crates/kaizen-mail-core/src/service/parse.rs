//! Full-message projection for the reader.

use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailHeaderMap, MailParseError, ParsedMail};
use tracing::warn;

use super::remote::{Envelope, FetchedMessage, Uid, join_short};

/// Subject shown when a message has none.
pub const NO_SUBJECT: &str = "(no subject)";

/// Metadata and content of one attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// File name, from the disposition or content type.
    pub filename: Option<String>,
    /// MIME type.
    pub content_type: String,
    /// Decoded size in bytes.
    pub size: usize,
    /// Content id for inline parts.
    pub cid: Option<String>,
    /// Decoded content.
    pub content: Vec<u8>,
}

/// A message opened in the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Message UID.
    pub uid: Uid,
    /// Subject, never empty.
    pub subject: String,
    /// Sender(s).
    pub from: String,
    /// Recipients.
    pub to: String,
    /// Date header, else INTERNALDATE.
    pub date: Option<DateTime<Utc>>,
    /// `text/plain` body.
    pub text: Option<String>,
    /// `text/html` body.
    pub html: Option<String>,
    /// Raw RFC 5322 source.
    pub raw: Option<Vec<u8>>,
    /// Attachments.
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Default)]
struct Content {
    subject: Option<String>,
    from: Option<String>,
    to: Option<String>,
    date: Option<DateTime<Utc>>,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<AttachmentMeta>,
}

impl ParsedMessage {
    /// Build the reader projection from a fetch result.
    ///
    /// Never fails: without a source the envelope is used alone, and if the
    /// source does not parse the envelope is used with the raw bytes kept.
    #[must_use]
    pub fn from_fetched(fetched: FetchedMessage) -> Self {
        let mut message =
            Self::from_envelope(fetched.uid, fetched.envelope.as_ref(), fetched.internal_date);
        let Some(raw) = fetched.source else {
            return message;
        };

        match parse_content(&raw) {
            Ok(content) => {
                if let Some(subject) = content.subject.filter(|s| !s.trim().is_empty()) {
                    message.subject = subject;
                }
                if let Some(from) = content.from.filter(|s| !s.is_empty()) {
                    message.from = from;
                }
                if let Some(to) = content.to.filter(|s| !s.is_empty()) {
                    message.to = to;
                }
                message.date = content.date.or(message.date);
                message.text = content.text.filter(|t| !t.is_empty());
                message.html = content.html.filter(|h| !h.is_empty());
                message.attachments = content.attachments;
            }
            Err(e) => {
                warn!(
                    uid = fetched.uid,
                    "Could not parse message source, showing envelope only: {e}"
                );
            }
        }
        message.raw = Some(raw);
        message
    }

    fn from_envelope(
        uid: Uid,
        envelope: Option<&Envelope>,
        internal_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            uid,
            subject: envelope
                .and_then(|e| e.subject.clone())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_SUBJECT.to_string()),
            from: envelope.map(|e| join_short(&e.from)).unwrap_or_default(),
            to: envelope.map(|e| join_short(&e.to)).unwrap_or_default(),
            date: internal_date,
            ..Self::default()
        }
    }
}

fn parse_content(raw: &[u8]) -> Result<Content, MailParseError> {
    let parsed = mailparse::parse_mail(raw)?;
    let mut content = Content {
        subject: parsed.headers.get_first_value("Subject"),
        from: parsed.headers.get_first_value("From"),
        to: parsed.headers.get_first_value("To"),
        date: parsed
            .headers
            .get_first_value("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        ..Content::default()
    };
    walk(&parsed, &mut content)?;
    Ok(content)
}

fn walk(part: &ParsedMail<'_>, content: &mut Content) -> Result<(), MailParseError> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            walk(sub, content)?;
        }
        return Ok(());
    }

    let mime = part.ctype.mimetype.to_ascii_lowercase();
    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();
    let is_attachment =
        disposition.disposition == DispositionType::Attachment || filename.is_some();

    if !is_attachment && mime == "text/plain" && content.text.is_none() {
        content.text = Some(part.get_body()?);
    } else if !is_attachment && mime == "text/html" && content.html.is_none() {
        content.html = Some(part.get_body()?);
    } else if is_attachment || !mime.starts_with("text/") {
        let bytes = part.get_body_raw()?;
        content.attachments.push(AttachmentMeta {
            filename,
            content_type: mime,
            size: bytes.len(),
            cid: part
                .headers
                .get_first_value("Content-ID")
                .map(|id| id.trim_matches(|c| c == '<' || c == '>').to_string()),
            content: bytes,
        });
    }
    Ok(())
}
