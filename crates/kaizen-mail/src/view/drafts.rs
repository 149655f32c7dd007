//! Saved drafts.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, List, ListItem, ListState, Paragraph};

use crate::app::App;
use crate::style::Theme;

pub fn view_drafts(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let block = Block::bordered().title(" Drafts ").border_style(theme.border(true));
    if app.draft_list.is_empty() {
        frame.render_widget(Paragraph::new("No drafts").style(theme.muted()).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .draft_list
        .iter()
        .map(|draft| {
            let subject = if draft.subject.trim().is_empty() {
                "(no subject)"
            } else {
                draft.subject.as_str()
            };
            let to = if draft.to.trim().is_empty() { "(no recipient)" } else { draft.to.as_str() };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{subject}  ")),
                Span::styled(format!("to {to}  "), theme.muted()),
                Span::styled(
                    draft.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
                    theme.muted(),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_symbol("\u{25b8} ")
        .highlight_style(theme.highlight());
    let mut state = ListState::default().with_selected(Some(app.draft_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}
