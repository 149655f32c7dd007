//! Search overlay form.

use chrono::NaiveDate;
use kaizen_mail_core::SearchCriteria;

use super::input::TextInput;

/// Date format accepted by the since/before fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    From,
    To,
    Subject,
    Body,
    Since,
    Before,
    Unseen,
    Flagged,
}

impl SearchField {
    pub const ORDER: [Self; 8] = [
        Self::From,
        Self::To,
        Self::Subject,
        Self::Body,
        Self::Since,
        Self::Before,
        Self::Unseen,
        Self::Flagged,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::From => "From",
            Self::To => "To",
            Self::Subject => "Subject",
            Self::Body => "Body",
            Self::Since => "Since (YYYY-MM-DD)",
            Self::Before => "Before (YYYY-MM-DD)",
            Self::Unseen => "Unread only",
            Self::Flagged => "Flagged only",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchForm {
    pub focus: SearchField,
    pub from: TextInput,
    pub to: TextInput,
    pub subject: TextInput,
    pub body: TextInput,
    pub since: TextInput,
    pub before: TextInput,
    pub unseen: bool,
    pub flagged: bool,
    pub error: Option<String>,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self {
            focus: SearchField::From,
            from: TextInput::default(),
            to: TextInput::default(),
            subject: TextInput::default(),
            body: TextInput::default(),
            since: TextInput::default(),
            before: TextInput::default(),
            unseen: false,
            flagged: false,
            error: None,
        }
    }
}

fn text(input: &TextInput) -> Option<String> {
    let value = input.value().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn date(input: &TextInput, label: &str) -> Result<Option<NaiveDate>, String> {
    let value = input.value().trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| format!("{label}: expected a date like 2024-01-31"))
}

impl SearchForm {
    /// Form pre-filled from the active filter.
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        let field = |v: &Option<String>| TextInput::new(v.clone().unwrap_or_default());
        let day = |d: Option<NaiveDate>| {
            TextInput::new(d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default())
        };
        Self {
            from: field(&criteria.from),
            to: field(&criteria.to),
            subject: field(&criteria.subject),
            body: field(&criteria.body),
            since: day(criteria.since),
            before: day(criteria.before),
            unseen: criteria.unseen,
            flagged: criteria.flagged,
            ..Self::default()
        }
    }

    pub fn next_field(&mut self) {
        let i = SearchField::ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = SearchField::ORDER[(i + 1) % SearchField::ORDER.len()];
    }

    pub fn prev_field(&mut self) {
        let len = SearchField::ORDER.len();
        let i = SearchField::ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = SearchField::ORDER[(i + len - 1) % len];
    }

    pub const fn input(&self, field: SearchField) -> Option<&TextInput> {
        match field {
            SearchField::From => Some(&self.from),
            SearchField::To => Some(&self.to),
            SearchField::Subject => Some(&self.subject),
            SearchField::Body => Some(&self.body),
            SearchField::Since => Some(&self.since),
            SearchField::Before => Some(&self.before),
            SearchField::Unseen | SearchField::Flagged => None,
        }
    }

    pub const fn input_mut(&mut self, field: SearchField) -> Option<&mut TextInput> {
        match field {
            SearchField::From => Some(&mut self.from),
            SearchField::To => Some(&mut self.to),
            SearchField::Subject => Some(&mut self.subject),
            SearchField::Body => Some(&mut self.body),
            SearchField::Since => Some(&mut self.since),
            SearchField::Before => Some(&mut self.before),
            SearchField::Unseen | SearchField::Flagged => None,
        }
    }

    /// Flip the checkbox under the cursor.
    pub const fn toggle(&mut self) {
        match self.focus {
            SearchField::Unseen => self.unseen = !self.unseen,
            SearchField::Flagged => self.flagged = !self.flagged,
            _ => {}
        }
    }

    pub fn display(&self, field: SearchField) -> String {
        let check = |on: bool| if on { "[x]" } else { "[ ]" }.to_string();
        match field {
            SearchField::Unseen => check(self.unseen),
            SearchField::Flagged => check(self.flagged),
            _ => self.input(field).map(|i| i.value().to_string()).unwrap_or_default(),
        }
    }

    /// Build criteria from the form.
    ///
    /// # Errors
    ///
    /// Returns a message naming the field when a date does not parse or the
    /// range is inverted.
    pub fn criteria(&self) -> Result<SearchCriteria, String> {
        let since = date(&self.since, "Since")?;
        let before = date(&self.before, "Before")?;
        if let (Some(s), Some(b)) = (since, before)
            && s >= b
        {
            return Err("Since must be earlier than Before".to_string());
        }
        Ok(SearchCriteria {
            from: text(&self.from),
            to: text(&self.to),
            subject: text(&self.subject),
            body: text(&self.body),
            since,
            before,
            unseen: self.unseen,
            flagged: self.flagged,
            all: false,
        })
    }
}
