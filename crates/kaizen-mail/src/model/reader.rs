//! Message reader state.

use kaizen_mail_core::ParsedMessage;
use tracing::warn;

/// An opened message and its display text.
#[derive(Debug, Clone)]
pub struct ReaderState {
    pub message: ParsedMessage,
    pub body: String,
    pub scroll: u16,
}

impl ReaderState {
    pub fn new(message: ParsedMessage) -> Self {
        let body = readable_body(&message);
        Self {
            message,
            body,
            scroll: 0,
        }
    }

    pub const fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub const fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

/// Plain text when present, otherwise the HTML converted to Markdown-ish
/// text.
pub fn readable_body(message: &ParsedMessage) -> String {
    if let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) {
        return text.to_string();
    }
    match message.html.as_deref() {
        Some(html) => htmd::convert(html).unwrap_or_else(|e| {
            warn!(uid = message.uid, "HTML conversion failed: {e}");
            html.to_string()
        }),
        None => "(no content)".to_string(),
    }
}
