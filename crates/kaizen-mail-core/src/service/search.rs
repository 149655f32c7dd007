//! Search criteria and their translation to an IMAP SEARCH query.

use chrono::NaiveDate;

/// Conjunctive search predicates. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Substring of `From`.
    pub from: Option<String>,
    /// Substring of `To`.
    pub to: Option<String>,
    /// Substring of `Subject`.
    pub subject: Option<String>,
    /// Substring of the body.
    pub body: Option<String>,
    /// Internal date on or after.
    pub since: Option<NaiveDate>,
    /// Internal date before.
    pub before: Option<NaiveDate>,
    /// Only messages without `\Seen`.
    pub unseen: bool,
    /// Only messages with `\Flagged`.
    pub flagged: bool,
    /// Match everything; other predicates are ignored.
    pub all: bool,
}

impl SearchCriteria {
    /// Criteria matching every message.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Only unseen messages.
    #[must_use]
    pub fn unseen() -> Self {
        Self {
            unseen: true,
            ..Self::default()
        }
    }

    /// Whether no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all
            && !self.unseen
            && !self.flagged
            && self.since.is_none()
            && self.before.is_none()
            && [&self.from, &self.to, &self.subject, &self.body]
                .iter()
                .all(|field| field.as_deref().is_none_or(|v| v.trim().is_empty()))
    }

    /// Translate to the argument of `UID SEARCH`.
    ///
    /// `all` short-circuits the rest; empty criteria also become `ALL`.
    /// Blank text fields are dropped.
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        if self.all || self.is_empty() {
            return "ALL".to_string();
        }

        let mut terms = Vec::new();
        let text_fields = [
            ("FROM", &self.from),
            ("TO", &self.to),
            ("SUBJECT", &self.subject),
            ("BODY", &self.body),
        ];
        let mut needs_utf8 = false;
        for (key, value) in text_fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                needs_utf8 |= !value.is_ascii();
                terms.push(format!("{key} {}", quote(value)));
            }
        }
        if let Some(since) = self.since {
            terms.push(format!("SINCE {}", imap_date(since)));
        }
        if let Some(before) = self.before {
            terms.push(format!("BEFORE {}", imap_date(before)));
        }
        if self.unseen {
            terms.push("UNSEEN".to_string());
        }
        if self.flagged {
            terms.push("FLAGGED".to_string());
        }

        let query = terms.join(" ");
        if needs_utf8 { format!("CHARSET UTF-8 {query}") } else { query }
    }
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// IMAP `date` (`1-Feb-2024`).
fn imap_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_all() {
        assert!(SearchCriteria::default().is_empty());
        assert_eq!(SearchCriteria::default().to_imap_query(), "ALL");

        let blank = SearchCriteria {
            subject: Some("   ".into()),
            ..SearchCriteria::default()
        };
        assert!(blank.is_empty());
        assert_eq!(blank.to_imap_query(), "ALL");
    }

    #[test]
    fn test_all_short_circuits() {
        let criteria = SearchCriteria {
            from: Some("ann".into()),
            unseen: true,
            all: true,
            ..SearchCriteria::default()
        };
        assert_eq!(criteria.to_imap_query(), "ALL");
    }

    #[test]
    fn test_unseen_only() {
        assert_eq!(SearchCriteria::unseen().to_imap_query(), "UNSEEN");
    }

    #[test]
    fn test_combined_predicates_in_order() {
        let criteria = SearchCriteria {
            from: Some("ann@example.com".into()),
            subject: Some("quarterly report".into()),
            since: NaiveDate::from_ymd_opt(2024, 2, 1),
            before: NaiveDate::from_ymd_opt(2024, 12, 25),
            flagged: true,
            ..SearchCriteria::default()
        };
        assert_eq!(
            criteria.to_imap_query(),
            "FROM \"ann@example.com\" SUBJECT \"quarterly report\" SINCE 1-Feb-2024 BEFORE 25-Dec-2024 FLAGGED"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let criteria = SearchCriteria {
            body: Some(r#"say "hi" \o/"#.into()),
            ..SearchCriteria::default()
        };
        assert_eq!(criteria.to_imap_query(), r#"BODY "say \"hi\" \\o/""#);
    }

    #[test]
    fn test_non_ascii_sets_charset() {
        let criteria = SearchCriteria {
            subject: Some("café".into()),
            ..SearchCriteria::default()
        };
        assert_eq!(criteria.to_imap_query(), "CHARSET UTF-8 SUBJECT \"café\"");
    }
}
