//! Header (status line) and footer (notice or key hints).

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use kaizen_mail_core::ConnectionStatus;

use crate::app::{App, Screen};
use crate::style::Theme;

pub fn view_header(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let (status, color) = match app.status {
        ConnectionStatus::Connected => ("connected", theme.success),
        ConnectionStatus::Reconnecting => ("reconnecting", theme.flagged),
        ConnectionStatus::Disconnected => ("offline", theme.error),
    };

    let mut spans = vec![Span::styled(" Kaizen Mail ", theme.title())];
    if let Some(config) = &app.config {
        spans.push(Span::styled(config.account.email.clone(), theme.muted()));
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("\u{25cf} {status}"), Style::default().fg(color)));
    }
    if !app.listing.mailbox.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::raw(app.listing.mailbox.clone()));
        if let Some(unread) = app.listing.unread {
            spans.push(Span::styled(
                format!(" ({unread} unread)"),
                Style::default().fg(theme.unread),
            ));
        }
    }
    if app.loading {
        spans.push(Span::styled("  loading...", theme.muted()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn hints(screen: Screen) -> &'static [(&'static str, &'static str)] {
    match screen {
        Screen::Unlock => &[("Enter", "unlock"), ("Esc", "quit")],
        Screen::Onboarding => &[
            ("Tab", "next"),
            ("\u{2190}\u{2192}", "provider"),
            ("Enter", "save"),
            ("Esc", "quit"),
        ],
        Screen::Mailboxes => &[
            ("j/k", "move"),
            ("Enter", "open"),
            ("Tab", "messages"),
            ("M", "manage"),
            ("?", "help"),
        ],
        Screen::Messages => &[
            ("n/p", "page"),
            ("Enter", "read"),
            ("/", "search"),
            ("v", "select"),
            ("s/f", "seen/flag"),
            ("x", "delete"),
            ("m", "move"),
            ("c", "compose"),
            ("?", "help"),
        ],
        Screen::Reader => &[
            ("r", "reply"),
            ("F", "forward"),
            ("E", "forward .eml"),
            ("o", "open HTML"),
            ("Esc", "back"),
        ],
        Screen::Compose => &[
            ("Tab", "field"),
            ("^X", "send"),
            ("^S", "draft"),
            ("^A", "attach"),
            ("^G", "signature"),
            ("Esc", "close"),
        ],
        Screen::Drafts => &[("Enter", "edit"), ("x", "delete"), ("Esc", "back")],
        Screen::Manager => &[("a", "create"), ("r", "rename"), ("x", "delete"), ("Esc", "back")],
        Screen::Help => &[("any key", "back")],
    }
}

pub fn view_footer(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let line = match &app.notice {
        Some(notice) => {
            let color = if notice.error { theme.error } else { theme.success };
            Line::styled(notice.text.clone(), Style::default().fg(color))
        }
        None => Line::from(
            hints(app.screen)
                .iter()
                .flat_map(|(key, label)| {
                    [Span::styled(*key, theme.key()), Span::raw(format!(" {label}  "))]
                })
                .collect::<Vec<_>>(),
        ),
    };
    frame.render_widget(Paragraph::new(line), area);
}
