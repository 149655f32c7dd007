//! Mailbox management: create, rename, delete.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, List, ListItem, ListState};

use crate::app::App;
use crate::style::Theme;

pub fn view_manager(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let items: Vec<ListItem> = app
        .mailboxes
        .iter()
        .map(|mailbox| {
            let mut spans = vec![Span::raw(mailbox.path.clone())];
            if !mailbox.selectable {
                spans.push(Span::styled("  (container)", theme.muted()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::bordered().title(" Manage mailboxes ").border_style(theme.border(true)))
        .highlight_symbol("\u{25b8} ")
        .highlight_style(theme.highlight());
    let selected = (!app.mailboxes.is_empty()).then_some(app.mailbox_cursor);
    let mut state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(list, area, &mut state);
}
