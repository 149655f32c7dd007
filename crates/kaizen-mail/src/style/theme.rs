//! Theme definitions for the application.

use ratatui::style::{Color, Modifier, Style};

/// Application theme colors.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Primary accent color.
    pub primary: Color,
    /// Primary text color.
    pub text: Color,
    /// Secondary/muted text color.
    pub text_secondary: Color,
    /// Border of unfocused panes.
    pub border: Color,
    /// Selected item background.
    pub selected: Color,
    /// Unread indicator color.
    pub unread: Color,
    /// Flagged/starred color.
    pub flagged: Color,
    /// Error notices.
    pub error: Color,
    /// Success and connected indicator.
    pub success: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default; most terminals).
    #[must_use]
    pub const fn dark() -> Self {
        Self {
            primary: Color::Cyan,
            text: Color::White,
            text_secondary: Color::DarkGray,
            border: Color::DarkGray,
            selected: Color::Rgb(40, 60, 90),
            unread: Color::LightBlue,
            flagged: Color::Yellow,
            error: Color::LightRed,
            success: Color::Green,
        }
    }

    pub fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.primary } else { self.border })
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.text_secondary)
    }

    pub fn highlight(&self) -> Style {
        Style::default().bg(self.selected).add_modifier(Modifier::BOLD)
    }

    pub fn key(&self) -> Style {
        Style::default().fg(self.primary).add_modifier(Modifier::BOLD)
    }
}
