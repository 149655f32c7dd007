//! # kaizen-mail-core
//!
//! Core logic for the Kaizen Mail terminal client.
//!
//! This crate provides:
//! - Account model, provider presets and validation
//! - A retried IMAP mailbox session over `async-imap`
//! - An SMTP connection pool with idle eviction over `lettre`
//! - Paging and search over a mailbox ([`MailBrowser`])
//! - Reply/forward/signature helpers
//! - Encrypted local storage for the configuration and drafts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod compose;
mod error;
pub mod listing;
pub mod service;
pub mod storage;

pub use account::credentials;
pub use account::{
    Account, CredentialError, CredentialResult, Provider, ProviderPreset, ServerConfig,
    ServerRole, ValidationError, ValidationResult, validate_account,
};
pub use compose::ComposeForm;
pub use error::{Error, Result};
pub use listing::{DEFAULT_PAGE_SIZE, MailBrowser};
pub use service::{
    ConnectionPool, ConnectionStatus, ImapConnector, LettreFactory, MailServiceError,
    MailboxSession, MessageSummary, OutgoingMessage, ParsedMessage, PoolConfig, RetryPolicy,
    SearchCriteria, SmtpError, TransportOptions,
};
pub use storage::{Config, ConfigStore, Draft, DraftStore, Signature, SignatureFormat, StoreError};
