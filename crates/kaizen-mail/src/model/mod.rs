//! UI state that is not tied to a single screen's rendering.

pub mod compose;
pub mod input;
pub mod onboarding;
pub mod reader;
pub mod search;

pub use compose::{ComposeField, ComposeState};
pub use input::TextInput;
pub use onboarding::{Completed, Field, OnboardingState};
pub use reader::ReaderState;
pub use search::{SearchField, SearchForm};
