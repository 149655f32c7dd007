//! Popups drawn over the current screen.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph};

use super::centered;
use crate::app::Prompt;
use crate::model::{SearchField, SearchForm};
use crate::style::Theme;

const LABEL_WIDTH: u16 = 22;

pub fn view_prompt(frame: &mut Frame, prompt: &Prompt, theme: &Theme) {
    let area = centered(frame.area(), 60, 3);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(prompt.input.value()).block(
            Block::bordered()
                .title(Span::styled(format!(" {} ", prompt.kind.title()), theme.title()))
                .border_style(theme.border(true)),
        ),
        area,
    );
    let x = u16::try_from(prompt.input.cursor()).unwrap_or(u16::MAX);
    frame.set_cursor_position(Position::new(
        area.x.saturating_add(1).saturating_add(x),
        area.y + 1,
    ));
}

pub fn view_search(frame: &mut Frame, form: &SearchForm, theme: &Theme) {
    let height = u16::try_from(SearchField::ORDER.len()).unwrap_or(u16::MAX) + 4;
    let area = centered(frame.area(), 64, height);
    frame.render_widget(Clear, area);

    let block = Block::bordered()
        .title(Span::styled(" Search (Enter apply, Esc cancel) ", theme.title()))
        .border_style(theme.border(true));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [fields, error] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(inner);
    let lines: Vec<Line> = SearchField::ORDER
        .iter()
        .map(|&field| {
            let focused = field == form.focus;
            let label_style = if focused { theme.key() } else { theme.muted() };
            Line::from(vec![
                Span::styled(
                    format!("{:<width$}", field.label(), width = usize::from(LABEL_WIDTH)),
                    label_style,
                ),
                Span::raw(form.display(field)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), fields);

    if let Some(message) = &form.error {
        frame.render_widget(
            Paragraph::new(message.as_str()).style(Style::default().fg(theme.error)),
            error,
        );
    }

    let row = SearchField::ORDER.iter().position(|f| *f == form.focus).unwrap_or(0);
    if let Some(input) = form.input(form.focus) {
        let x = fields.x + LABEL_WIDTH + u16::try_from(input.cursor()).unwrap_or(0);
        let y = fields.y + u16::try_from(row).unwrap_or(0);
        frame.set_cursor_position(Position::new(x, y));
    }
}
