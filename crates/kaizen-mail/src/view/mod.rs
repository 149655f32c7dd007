//! View components for the application.

mod compose;
mod drafts;
mod header;
mod help;
mod manager;
mod message_list;
mod message_view;
mod onboarding;
mod overlay;
mod sidebar;

use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};

use crate::app::{App, Screen};
use crate::style::Theme;

/// Draw the whole UI.
pub fn render(frame: &mut Frame, app: &App) {
    let theme = Theme::default();
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    header::view_header(frame, header, app, &theme);
    match app.screen {
        Screen::Unlock => onboarding::view_unlock(frame, body, app, &theme),
        Screen::Onboarding => onboarding::view_onboarding(frame, body, &app.onboarding, &theme),
        Screen::Mailboxes | Screen::Messages => {
            let [left, right] = Layout::horizontal([
                Constraint::Percentage(25),
                Constraint::Percentage(75),
            ])
            .areas(body);
            sidebar::view_sidebar(frame, left, app, &theme);
            message_list::view_message_list(frame, right, app, &theme);
        }
        Screen::Reader => message_view::view_message_content(frame, body, app, &theme),
        Screen::Compose => compose::view_compose(frame, body, app, &theme),
        Screen::Drafts => drafts::view_drafts(frame, body, app, &theme),
        Screen::Manager => manager::view_manager(frame, body, app, &theme),
        Screen::Help => help::view_help(frame, body, &theme),
    }
    header::view_footer(frame, footer, app, &theme);

    if let Some(form) = &app.search {
        overlay::view_search(frame, form, &theme);
    }
    if let Some(prompt) = &app.prompt {
        overlay::view_prompt(frame, prompt, &theme);
    }
}

/// Rectangle of the given size centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)]).flex(Flex::Center).areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width)]).flex(Flex::Center).areas(row);
    rect
}
