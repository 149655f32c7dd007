//! Colors and text styles for the terminal UI.

mod theme;

pub use theme::Theme;
