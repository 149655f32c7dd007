//! Error types for the core library.

use thiserror::Error;

use crate::account::{CredentialError, ValidationError};
use crate::service::{MailServiceError, SmtpError};
use crate::storage::StoreError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Mailbox session operation failed.
    #[error(transparent)]
    Mail(#[from] MailServiceError),

    /// Sending failed.
    #[error(transparent)]
    Smtp(#[from] SmtpError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Account failed validation.
    #[error("Invalid account: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
