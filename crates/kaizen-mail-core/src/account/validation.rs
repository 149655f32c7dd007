//! Checks run on an account before it is saved.
//!
//! Onboarding asks for a name, an email address and one password; provider
//! presets fill in the servers. Only custom setups type in hosts and ports.

use std::fmt;

use thiserror::Error;

use super::model::{Account, ServerConfig};

/// Which server block a problem belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Incoming mail.
    Imap,
    /// Outgoing mail.
    Smtp,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Imap => "IMAP",
            Self::Smtp => "SMTP",
        })
    }
}

/// A single problem with an account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No display name.
    #[error("Name is required")]
    MissingName,
    /// No email address.
    #[error("Email is required")]
    MissingEmail,
    /// The address does not parse as a mailbox.
    #[error("{0:?} is not an email address")]
    MalformedEmail(String),
    /// No password for one of the servers.
    #[error("Password is required")]
    MissingPassword,
    /// Server host left blank.
    #[error("{0} server is required")]
    MissingHost(ServerRole),
    /// Host contains spaces or a URL scheme.
    #[error("{0} server {1:?} is not a host name")]
    MalformedHost(ServerRole, String),
    /// Port 0.
    #[error("{0} port must be between 1 and 65535")]
    ZeroPort(ServerRole),
    /// Login name left blank.
    #[error("{0} user name is required")]
    MissingUser(ServerRole),
}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account, collecting every problem.
///
/// # Errors
///
/// Returns all problems found, in form order.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.display_name.trim().is_empty() {
        errors.push(ValidationError::MissingName);
    }

    let email = account.email.trim();
    if email.is_empty() {
        errors.push(ValidationError::MissingEmail);
    } else if email.parse::<lettre::Address>().is_err() {
        errors.push(ValidationError::MalformedEmail(email.to_string()));
    }

    if account.imap.password.is_empty() || account.smtp.password.is_empty() {
        errors.push(ValidationError::MissingPassword);
    }

    check_server(ServerRole::Imap, &account.imap, &mut errors);
    check_server(ServerRole::Smtp, &account.smtp, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_server(role: ServerRole, server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    let host = server.host.trim();
    if host.is_empty() {
        errors.push(ValidationError::MissingHost(role));
    } else if host.contains("://") || host.contains(char::is_whitespace) {
        errors.push(ValidationError::MalformedHost(role, host.to_string()));
    }
    if server.port == 0 {
        errors.push(ValidationError::ZeroPort(role));
    }
    if server.user.trim().is_empty() {
        errors.push(ValidationError::MissingUser(role));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::Provider;

    fn custom() -> Account {
        let mut account = Account::from_provider(Provider::Custom, "Ann", "ann@example.org", "pw");
        account.imap.host = "mail.example.org".into();
        account.imap.port = 993;
        account.smtp.host = "mail.example.org".into();
        account.smtp.port = 465;
        account
    }

    #[test]
    fn test_every_preset_passes() {
        for provider in [Provider::Gmail, Provider::Outlook, Provider::ICloud, Provider::Yahoo] {
            let account = Account::from_provider(provider, "Ann", "ann@example.com", "secret");
            assert_eq!(validate_account(&account), Ok(()), "{provider:?}");
        }
    }

    #[test]
    fn test_blank_form_reports_in_form_order() {
        let account = Account::from_provider(Provider::Custom, " ", "", "");
        let errors = validate_account(&account).unwrap_err();
        assert_eq!(
            errors[..3],
            [
                ValidationError::MissingName,
                ValidationError::MissingEmail,
                ValidationError::MissingPassword,
            ]
        );
    }

    #[test]
    fn test_malformed_email_is_quoted() {
        let account = Account::from_provider(Provider::Gmail, "Ann", "ann at example.com", "pw");
        let errors = validate_account(&account).unwrap_err();
        assert_eq!(errors[0].to_string(), "\"ann at example.com\" is not an email address");
    }

    #[test]
    fn test_custom_servers_checked_per_role() {
        let mut account = custom();
        assert!(validate_account(&account).is_ok());

        account.imap.host = "imaps://mail.example.org".into();
        account.smtp.host = String::new();
        account.smtp.port = 0;
        let errors = validate_account(&account).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MalformedHost(ServerRole::Imap, "imaps://mail.example.org".into()),
                ValidationError::MissingHost(ServerRole::Smtp),
                ValidationError::ZeroPort(ServerRole::Smtp),
            ]
        );
        assert_eq!(errors[2].to_string(), "SMTP port must be between 1 and 65535");
    }

    #[test]
    fn test_missing_login_user() {
        let mut account = custom();
        account.smtp.user = "  ".into();
        assert_eq!(
            validate_account(&account),
            Err(vec![ValidationError::MissingUser(ServerRole::Smtp)])
        );
    }
}
