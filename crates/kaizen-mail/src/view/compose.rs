//! Compose screen.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};

use crate::app::App;
use crate::model::{ComposeField, TextInput};
use crate::style::Theme;

fn field(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &TextInput,
    focused: bool,
    theme: &Theme,
) {
    frame.render_widget(
        Paragraph::new(input.value()).block(
            Block::bordered()
                .title(format!(" {title} "))
                .border_style(theme.border(focused)),
        ),
        area,
    );
    if focused {
        let x = u16::try_from(input.cursor()).unwrap_or(u16::MAX);
        frame.set_cursor_position(Position::new(
            area.x.saturating_add(1).saturating_add(x),
            area.y + 1,
        ));
    }
}

pub fn view_compose(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let Some(compose) = &app.compose else {
        return;
    };
    let [to, subject, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    field(frame, to, "To", &compose.to, compose.focus == ComposeField::To, theme);
    field(
        frame,
        subject,
        "Subject",
        &compose.subject,
        compose.focus == ComposeField::Subject,
        theme,
    );

    let body_focused = compose.focus == ComposeField::Body;
    frame.render_widget(
        Paragraph::new(compose.body.value())
            .wrap(Wrap { trim: false })
            .block(Block::bordered().title(" Message ").border_style(theme.border(body_focused))),
        body,
    );
    if body_focused {
        let before: String = compose.body.value().chars().take(compose.body.cursor()).collect();
        let line = before.matches('\n').count();
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        let column = u16::try_from(column).unwrap_or(u16::MAX);
        let line = u16::try_from(line).unwrap_or(u16::MAX);
        let x = body.x + 1 + column.min(body.width.saturating_sub(3));
        let y = body.y + 1 + line.min(body.height.saturating_sub(3));
        frame.set_cursor_position(Position::new(x, y));
    }

    let mut spans = vec![Span::styled(
        if compose.include_signature { "signature on" } else { "signature off" },
        theme.muted(),
    )];
    let names = compose.attachment_names();
    if !names.is_empty() {
        spans.push(Span::raw("  \u{1f4ce} "));
        spans.push(Span::raw(names.join(", ")));
    }
    if compose.sending {
        spans.push(Span::styled("  sending...", theme.key()));
    }
    if let Some(id) = &compose.draft_id {
        spans.push(Span::styled(format!("  draft {id}"), theme.muted()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), footer);
}
