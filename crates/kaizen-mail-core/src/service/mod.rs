//! Core services for email operations.
//!
//! The mailbox session drives one IMAP connection through a [`RetryPolicy`];
//! outgoing mail goes through the [`ConnectionPool`]. Both talk to the
//! network only through the traits in [`remote`] and [`smtp`], so tests swap
//! in in-memory fakes.

pub mod imap;
mod mailbox;
mod parse;
mod pool;
pub mod remote;
mod retry;
mod search;
pub mod smtp;
#[cfg(test)]
pub(crate) mod testing;

pub use imap::{ImapConnector, ImapStore};
pub use mailbox::{ConnectionStatus, MailServiceError, MailboxSession, MessageSummary};
pub use parse::{AttachmentMeta, NO_SUBJECT, ParsedMessage};
pub use pool::{ConnectionPool, PoolConfig};
pub use remote::{Address, Connector, MailStore, MailboxInfo, MailboxKind, MailboxStatus, Uid};
pub use retry::RetryPolicy;
pub use search::SearchCriteria;
pub use smtp::{
    AttachmentSource, LettreFactory, LettreTransport, OutgoingAttachment, OutgoingMessage,
    SmtpError, Transport, TransportFactory, TransportOptions,
};
