//! Composing replies, forwards and new messages.

use chrono::{DateTime, Local, Utc};

use crate::service::{OutgoingAttachment, OutgoingMessage, ParsedMessage};
use crate::storage::{Draft, DraftAttachment, DraftInput, Signature, SignatureFormat};

/// Separator between body and plain-text signature.
pub const SIGNATURE_SEPARATOR: &str = "\n\n-- \n";

/// Content type of an attached original message.
pub const RFC822: &str = "message/rfc822";

/// Fields of the compose screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeForm {
    /// Draft this form was opened from or last saved to.
    pub draft_id: Option<String>,
    /// Comma-separated recipients.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Attachments.
    pub attachments: Vec<DraftAttachment>,
}

/// Add `prefix: ` unless the subject already starts with it, ignoring case
/// and whitespace before the colon.
#[must_use]
pub fn prefix_subject(prefix: &str, subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        return format!("{prefix}: ");
    }
    let already = subject
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        && subject[prefix.len()..].trim_start().starts_with(':');
    if already {
        subject.to_string()
    } else {
        format!("{prefix}: {subject}")
    }
}

fn display_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.with_timezone(&Local).format("%a, %d %b %Y %H:%M").to_string())
}

/// Quoted original for a reply: attribution line, then every line of the
/// text body prefixed with `> `.
#[must_use]
pub fn quote_body(message: &ParsedMessage) -> String {
    let date = display_date(message.date).unwrap_or_else(|| "unknown date".to_string());
    let from = if message.from.is_empty() { "unknown" } else { &message.from };
    let quoted = message
        .text
        .as_deref()
        .unwrap_or_default()
        .split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nOn {date}, {from} wrote:\n{quoted}")
}

/// Reply to the sender with the original quoted.
#[must_use]
pub fn reply_to(message: &ParsedMessage) -> ComposeForm {
    ComposeForm {
        to: message.from.clone(),
        subject: prefix_subject("Re", &message.subject),
        body: quote_body(message),
        ..ComposeForm::default()
    }
}

/// Forward with a header block, optionally attaching the raw original as
/// `message/rfc822`.
#[must_use]
pub fn forward(message: &ParsedMessage, attach_original: bool) -> ComposeForm {
    let header = [
        "----- Forwarded message -----".to_string(),
        format!("From: {}", message.from),
        format!("Date: {}", display_date(message.date).unwrap_or_default()),
        format!("Subject: {}", message.subject),
        format!("To: {}", message.to),
        String::new(),
    ]
    .join("\n");

    let mut attachments = Vec::new();
    if attach_original && let Some(raw) = &message.raw {
        let filename = if message.subject.trim().is_empty() {
            "forwarded-message.eml".to_string()
        } else {
            format!("{}.eml", message.subject)
        };
        attachments.push(DraftAttachment {
            filename: Some(filename),
            content: Some(raw.clone()),
            content_type: Some(RFC822.to_string()),
            ..DraftAttachment::default()
        });
    }

    ComposeForm {
        to: String::new(),
        subject: prefix_subject("Fwd", &message.subject),
        body: format!("{header}\n{}", message.text.as_deref().unwrap_or_default()),
        attachments,
        draft_id: None,
    }
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escaped text with line breaks as `<br/>`.
#[must_use]
pub fn text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br/>")
}

/// Body with a plain-text signature appended. HTML signatures only go into
/// the HTML part.
#[must_use]
pub fn append_signature(body: &str, signature: Option<&Signature>) -> String {
    match signature.and_then(Signature::active) {
        Some(sig) if sig.format == SignatureFormat::Text => {
            format!("{body}{SIGNATURE_SEPARATOR}{}", sig.content)
        }
        _ => body.to_string(),
    }
}

/// HTML document for the message body and signature.
#[must_use]
pub fn build_html_email(subject: &str, body: &str, signature: Option<&Signature>) -> String {
    let signature = signature.and_then(Signature::active).map(|sig| match sig.format {
        SignatureFormat::Html => sig.content.clone(),
        SignatureFormat::Text => text_to_html(&sig.content),
    });
    let signature_block = signature.map_or_else(String::new, |sig| {
        format!(
            "<hr style=\"border:none;border-top:1px solid #e5e7eb;margin:24px 0;\"/>\
             <div class=\"signature\" style=\"color:#6b7280;white-space:pre-wrap\">{sig}</div>"
        )
    });

    format!(
        "<!doctype html>\n<html>\n<head>\n  <meta charset=\"utf-8\" />\n  \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n  \
         <title>{title}</title>\n  <style>\n    body{{margin:0;background:#f9fafb}}\n    \
         .container{{max-width:640px;margin:24px auto;padding:24px;background:#fff;\
         border:1px solid #e5e7eb;border-radius:12px;font:16px/1.6 system-ui,sans-serif;color:#111827}}\n    \
         a{{color:#2563eb}}\n  </style>\n</head>\n<body>\n  \
         <div class=\"container\">{body}{signature_block}</div>\n</body>\n</html>",
        title = escape_html(subject),
        body = text_to_html(body),
    )
}

impl From<DraftAttachment> for OutgoingAttachment {
    fn from(attachment: DraftAttachment) -> Self {
        let name = attachment.filename.clone().unwrap_or_default();
        let base = match (attachment.content, attachment.path) {
            (Some(content), _) => Self::bytes(name, content),
            (None, Some(path)) => Self::file(path),
            (None, None) => Self::bytes(name, Vec::new()),
        };
        Self {
            filename: attachment.filename.unwrap_or(base.filename),
            content_type: attachment.content_type,
            cid: attachment.cid,
            source: base.source,
        }
    }
}

impl ComposeForm {
    /// Whether nothing has been entered.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.to.trim().is_empty()
            && self.subject.trim().is_empty()
            && self.body.trim().is_empty()
            && self.attachments.is_empty()
    }

    /// Attach a file by path; it is read at send time.
    pub fn attach_file(&mut self, path: &str) {
        let filename = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.attachments.push(DraftAttachment {
            filename,
            path: Some(path.to_string()),
            ..DraftAttachment::default()
        });
    }

    /// Message to send: text with signature plus the HTML rendition.
    #[must_use]
    pub fn to_outgoing(&self, signature: Option<&Signature>) -> OutgoingMessage {
        OutgoingMessage {
            to: self.to.clone(),
            subject: self.subject.clone(),
            text: Some(append_signature(&self.body, signature)),
            html: Some(build_html_email(&self.subject, &self.body, signature)),
            attachments: self.attachments.iter().cloned().map(OutgoingAttachment::from).collect(),
        }
    }

    /// Draft record for saving.
    #[must_use]
    pub fn to_draft_input(&self) -> DraftInput {
        DraftInput {
            id: self.draft_id.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachments: self.attachments.clone(),
        }
    }
}

impl From<Draft> for ComposeForm {
    fn from(draft: Draft) -> Self {
        Self {
            draft_id: Some(draft.id),
            to: draft.to,
            subject: draft.subject,
            body: draft.body,
            attachments: draft.attachments,
        }
    }
}
