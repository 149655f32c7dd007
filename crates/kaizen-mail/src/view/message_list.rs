//! Message list for the open mailbox.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Cell, Paragraph, Row, Table, TableState};

use kaizen_mail_core::MessageSummary;

use crate::app::{App, Screen};
use crate::style::Theme;

fn date(message: &MessageSummary) -> String {
    message
        .date
        .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn row<'a>(message: &'a MessageSummary, selected: bool, theme: &Theme) -> Row<'a> {
    let marks = format!(
        "{}{}{}",
        if selected { '\u{2713}' } else { ' ' },
        if message.seen { ' ' } else { '\u{25cf}' },
        if message.flagged { '\u{2605}' } else { ' ' },
    );
    let style = if message.seen {
        Style::default().fg(theme.text)
    } else {
        Style::default().fg(theme.unread).add_modifier(Modifier::BOLD)
    };
    Row::new([
        Cell::from(Span::styled(marks, Style::default().fg(theme.flagged))),
        Cell::from(message.from.as_str()),
        Cell::from(message.subject.as_str()),
        Cell::from(Span::styled(date(message), theme.muted())),
    ])
    .style(style)
}

pub fn view_message_list(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let listing = &app.listing;
    let mailbox =
        if listing.mailbox.is_empty() { "No mailbox" } else { listing.mailbox.as_str() };
    let mut title = vec![Span::styled(format!(" {mailbox} "), theme.title())];
    title.push(Span::raw(format!(
        "page {}/{} \u{b7} {} message(s) ",
        listing.page + 1,
        listing.total_pages.max(1),
        listing.total
    )));
    if listing.filter.is_some() {
        title.push(Span::styled("[filtered, Esc clears] ", Style::default().fg(theme.flagged)));
    }
    if !app.selected.is_empty() {
        title.push(Span::styled(format!("[{} selected] ", app.selected.len()), theme.key()));
    }
    let block = Block::bordered()
        .title(Line::from(title))
        .border_style(theme.border(app.screen == Screen::Messages));

    if listing.messages.is_empty() {
        let text = if app.loading { "Loading messages..." } else { "No messages" };
        frame.render_widget(Paragraph::new(text).style(theme.muted()).block(block), area);
        return;
    }

    let rows = listing
        .messages
        .iter()
        .map(|m| row(m, app.selected.contains(&m.uid), theme));
    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Percentage(28),
            Constraint::Fill(1),
            Constraint::Length(16),
        ],
    )
    .block(block)
    .row_highlight_style(theme.highlight());

    let mut state = TableState::default().with_selected(Some(app.list_cursor));
    frame.render_stateful_widget(table, area, &mut state);
}
