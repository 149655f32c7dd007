//! Unlock prompt and first-run account form.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};

use super::centered;
use crate::app::App;
use crate::model::OnboardingState;
use crate::style::Theme;

const LABEL_WIDTH: u16 = 22;

pub fn view_unlock(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let rect = centered(area, 50, 5);
    let block = Block::bordered()
        .title(Span::styled(" Unlock Kaizen Mail ", theme.title()))
        .border_style(theme.border(true));
    let lines = vec![
        Line::styled(format!("Config: {}", app.dir().display()), theme.muted()),
        Line::from(vec![Span::raw("Passphrase: "), Span::raw(app.unlock.masked())]),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), rect);
    let x = u16::try_from(app.unlock.cursor()).unwrap_or(0);
    frame.set_cursor_position(Position::new(rect.x + 13 + x, rect.y + 2));
}

pub fn view_onboarding(frame: &mut Frame, area: Rect, form: &OnboardingState, theme: &Theme) {
    let fields = form.visible_fields();
    let field_rows = u16::try_from(fields.len()).unwrap_or(u16::MAX);
    let error_rows = u16::try_from(form.errors.len()).unwrap_or(u16::MAX);
    let rect = centered(area, 72, field_rows + error_rows + 6);

    let block = Block::bordered()
        .title(Span::styled(" Set up your account ", theme.title()))
        .border_style(theme.border(true));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let [list, notes, errors] = Layout::vertical([
        Constraint::Length(field_rows),
        Constraint::Length(2),
        Constraint::Fill(1),
    ])
    .areas(inner);

    let lines: Vec<Line> = fields
        .iter()
        .map(|&field| {
            let label_style = if field == form.focus { theme.key() } else { theme.muted() };
            Line::from(vec![
                Span::styled(
                    format!("{:<width$}", field.label(), width = usize::from(LABEL_WIDTH)),
                    label_style,
                ),
                Span::raw(form.display(field)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), list);

    let hint = form
        .notes()
        .unwrap_or("The passphrase encrypts your settings and drafts on disk.");
    frame.render_widget(Paragraph::new(hint).style(theme.muted()).wrap(Wrap { trim: true }), notes);

    let error_lines: Vec<Line> = form
        .errors
        .iter()
        .map(|e| Line::styled(format!("\u{2022} {e}"), Style::default().fg(theme.error)))
        .collect();
    frame.render_widget(Paragraph::new(error_lines), errors);

    let row = fields.iter().position(|f| *f == form.focus).unwrap_or(0);
    if let Some(input) = form.input(form.focus) {
        let x = list.x + LABEL_WIDTH + u16::try_from(input.cursor()).unwrap_or(0);
        let y = list.y + u16::try_from(row).unwrap_or(0);
        frame.set_cursor_position(Position::new(x, y));
    }
}
