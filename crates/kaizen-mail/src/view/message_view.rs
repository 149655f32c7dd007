//! Reader for one message.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};

use crate::app::App;
use crate::style::Theme;

pub fn view_message_content(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let Some(reader) = &app.reader else {
        let text = if app.loading { "Loading message..." } else { "Message unavailable" };
        frame.render_widget(
            Paragraph::new(text).style(theme.muted()).block(Block::bordered()),
            area,
        );
        return;
    };
    let message = &reader.message;

    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{label:>9}: "), theme.muted()), Span::raw(value)])
    };
    let mut header = vec![
        field("From", message.from.clone()),
        field("To", message.to.clone()),
        field(
            "Date",
            message
                .date
                .map(|d| d.with_timezone(&Local).format("%a, %d %b %Y %H:%M").to_string())
                .unwrap_or_default(),
        ),
    ];
    if !message.attachments.is_empty() {
        let names = message
            .attachments
            .iter()
            .map(|a| {
                let name = a.filename.as_deref().unwrap_or("unnamed");
                format!("{name} ({} KB)", a.size.div_ceil(1024))
            })
            .collect::<Vec<_>>()
            .join(", ");
        header.push(field("Attached", names));
    }

    let header_height = u16::try_from(header.len()).unwrap_or(u16::MAX).saturating_add(2);
    let [top, body] =
        Layout::vertical([Constraint::Length(header_height), Constraint::Fill(1)]).areas(area);

    frame.render_widget(
        Paragraph::new(header).block(
            Block::bordered()
                .title(Span::styled(format!(" {} ", message.subject), theme.title())),
        ),
        top,
    );
    frame.render_widget(
        Paragraph::new(reader.body.as_str())
            .wrap(Wrap { trim: false })
            .scroll((reader.scroll, 0))
            .block(Block::bordered().border_style(theme.border(true))),
        body,
    );
}
