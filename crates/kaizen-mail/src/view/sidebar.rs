//! Mailbox list on the left.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, List, ListItem, ListState};

use kaizen_mail_core::service::MailboxKind;

use crate::app::{App, Screen};
use crate::style::Theme;

const fn icon(kind: MailboxKind) -> &'static str {
    match kind {
        MailboxKind::Inbox => "\u{1f4e5}",
        MailboxKind::Sent => "\u{1f4e4}",
        MailboxKind::Drafts => "\u{1f4dd}",
        MailboxKind::Trash => "\u{1f5d1}",
        MailboxKind::Spam => "\u{26a0}",
        MailboxKind::Archive => "\u{1f4e6}",
        MailboxKind::Regular => "\u{1f4c1}",
    }
}

pub fn view_sidebar(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let focused = app.screen == Screen::Mailboxes;
    let items: Vec<ListItem> = app
        .mailboxes
        .iter()
        .map(|mailbox| {
            let mut item = ListItem::new(format!("{} {}", icon(mailbox.kind), mailbox.name));
            if mailbox.path == app.listing.mailbox {
                item = item.style(theme.title());
            } else if !mailbox.selectable {
                item = item.style(theme.muted());
            }
            item
        })
        .collect();

    let list = List::new(items)
        .block(Block::bordered().title(" Mailboxes ").border_style(theme.border(focused)))
        .highlight_symbol("\u{25b8} ")
        .highlight_style(theme.highlight());

    let selected = (!app.mailboxes.is_empty()).then_some(app.mailbox_cursor);
    let mut state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(list, area, &mut state);
}
