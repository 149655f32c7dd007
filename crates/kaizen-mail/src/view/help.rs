//! Keyboard shortcut reference.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::style::Theme;

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("q / Ctrl-C", "quit"),
            ("Tab", "switch between mailboxes and messages"),
            ("j k / \u{2191}\u{2193}", "move in lists"),
            ("Enter", "open"),
            ("Esc", "back / cancel"),
            ("Ctrl-R", "reconnect"),
            ("?", "this help"),
        ],
    ),
    (
        "Mailboxes",
        &[("M", "manage mailboxes"), ("S", "edit signature"), ("d", "drafts"), ("c", "compose")],
    ),
    (
        "Messages",
        &[
            ("n / p", "next / previous page"),
            ("r", "refresh"),
            ("/", "search"),
            ("Esc", "clear selection, then filter"),
            ("v", "select for bulk actions"),
            ("s", "toggle read"),
            ("f", "toggle flag"),
            ("x", "delete"),
            ("m", "move"),
        ],
    ),
    (
        "Reader",
        &[
            ("r", "reply"),
            ("F", "forward"),
            ("E", "forward as .eml attachment"),
            ("o", "open HTML in browser"),
            ("PgUp / PgDn", "scroll"),
        ],
    ),
    (
        "Compose",
        &[
            ("Tab", "next field"),
            ("Ctrl-X", "send"),
            ("Ctrl-S", "save draft"),
            ("Ctrl-A", "attach file"),
            ("Ctrl-R", "remove last attachment"),
            ("Ctrl-G", "toggle signature"),
            ("Esc", "close (keeps a draft)"),
        ],
    ),
];

pub fn view_help(frame: &mut Frame, area: Rect, theme: &Theme) {
    let block = Block::bordered()
        .title(Span::styled(" Kaizen Mail - Keyboard Shortcuts ", theme.title()))
        .border_style(theme.border(true));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).split(inner);
    let (left, right) = SECTIONS.split_at(SECTIONS.len().div_ceil(2));
    for (column, sections) in columns.iter().zip([left, right]) {
        let mut lines = Vec::new();
        for (title, keys) in sections {
            lines.push(Line::styled(*title, theme.key()));
            for (key, label) in *keys {
                lines.push(Line::from(vec![
                    Span::raw(format!("  {key:<16}")),
                    Span::styled(*label, theme.muted()),
                ]));
            }
            lines.push(Line::default());
        }
        frame.render_widget(Paragraph::new(lines), *column);
    }
}
