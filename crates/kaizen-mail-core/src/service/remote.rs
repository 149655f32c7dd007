//! The remote mailbox seen through a protocol client.
//!
//! [`MailStore`] is the narrow set of IMAP operations the session facade
//! needs. The production implementation lives in [`super::imap`]; tests
//! substitute an in-memory store.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};

use super::MailServiceError;
use crate::account::ServerConfig;

/// Server-assigned, mailbox-scoped message identifier.
pub type Uid = u32;

/// Kind of mailbox, from special-use attributes or the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxKind {
    /// Inbox folder.
    Inbox,
    /// Sent mail folder.
    Sent,
    /// Drafts folder.
    Drafts,
    /// Trash folder.
    Trash,
    /// Spam/junk folder.
    Spam,
    /// Archive folder.
    Archive,
    /// Regular folder.
    Regular,
}

impl MailboxKind {
    /// Guess the kind from a mailbox path.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower == "inbox" {
            Self::Inbox
        } else if lower.contains("sent") {
            Self::Sent
        } else if lower.contains("draft") {
            Self::Drafts
        } else if lower.contains("trash") || lower.contains("deleted") {
            Self::Trash
        } else if lower.contains("spam") || lower.contains("junk") {
            Self::Spam
        } else if lower.contains("archive") {
            Self::Archive
        } else {
            Self::Regular
        }
    }
}

/// A mailbox returned by LIST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Last path segment.
    pub name: String,
    /// Full path used to open the mailbox.
    pub path: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<String>,
    /// Whether the mailbox can be opened.
    pub selectable: bool,
    /// Mailbox kind.
    pub kind: MailboxKind,
}

impl MailboxInfo {
    /// Build from a path, deriving name and kind.
    #[must_use]
    pub fn new(path: impl Into<String>, delimiter: Option<&str>) -> Self {
        let path = path.into();
        let name = delimiter
            .filter(|d| !d.is_empty())
            .and_then(|d| path.rsplit(d).next())
            .unwrap_or(&path)
            .to_string();
        Self {
            kind: MailboxKind::from_name(&path),
            name,
            delimiter: delimiter.map(ToString::to_string),
            path,
            selectable: true,
        }
    }
}

/// Status returned when a mailbox is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// First unseen sequence number, if reported.
    pub unseen: Option<u32>,
    /// UIDVALIDITY.
    pub uid_validity: Option<u32>,
}

/// A mail address from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// `local@domain`.
    pub email: String,
}

impl Address {
    /// Address without a display name.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Short form for lists: the address, or the name if there is no address.
    #[must_use]
    pub fn short(&self) -> &str {
        if self.email.is_empty() {
            self.name.as_deref().unwrap_or_default()
        } else {
            &self.email
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Join addresses in short form with `", "`, skipping empty ones.
#[must_use]
pub fn join_short(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(Address::short)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Envelope projection of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Decoded subject.
    pub subject: Option<String>,
    /// `From` addresses.
    pub from: Vec<Address>,
    /// `To` addresses.
    pub to: Vec<Address>,
    /// `Cc` addresses.
    pub cc: Vec<Address>,
    /// Parsed `Date` header.
    pub date: Option<DateTime<Utc>>,
    /// `Message-ID`.
    pub message_id: Option<String>,
}

/// Which parts of a message to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Envelope, flags and internal date.
    Summary,
    /// Summary plus the full raw source.
    Full,
}

/// Flags the client reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`.
    Seen,
    /// `\Flagged`.
    Flagged,
    /// `\Deleted`.
    Deleted,
}

impl Flag {
    /// Wire name.
    #[must_use]
    pub const fn as_imap(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
        }
    }
}

/// One FETCH result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Message UID.
    pub uid: Uid,
    /// Envelope, when the server returned one.
    pub envelope: Option<Envelope>,
    /// `\Seen` is set.
    pub seen: bool,
    /// `\Flagged` is set.
    pub flagged: bool,
    /// INTERNALDATE.
    pub internal_date: Option<DateTime<Utc>>,
    /// Raw RFC 5322 source, only for [`Projection::Full`].
    pub source: Option<Vec<u8>>,
}

/// Operations against one authenticated IMAP session.
///
/// Calls are issued sequentially; implementations are not expected to
/// pipeline. Every method maps protocol failures to [`MailServiceError`].
pub trait MailStore: Send {
    /// LIST all mailboxes.
    fn list_mailboxes(
        &mut self,
    ) -> impl Future<Output = Result<Vec<MailboxInfo>, MailServiceError>> + Send;

    /// SELECT a mailbox.
    fn select(
        &mut self,
        path: &str,
    ) -> impl Future<Output = Result<MailboxStatus, MailServiceError>> + Send;

    /// UID SEARCH with a raw query; returns UIDs ascending.
    fn search(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Uid>, MailServiceError>> + Send;

    /// UID FETCH the given UIDs.
    fn fetch(
        &mut self,
        uids: &[Uid],
        projection: Projection,
    ) -> impl Future<Output = Result<Vec<FetchedMessage>, MailServiceError>> + Send;

    /// FETCH by sequence number.
    fn fetch_sequence(
        &mut self,
        seq: u32,
        projection: Projection,
    ) -> impl Future<Output = Result<Vec<FetchedMessage>, MailServiceError>> + Send;

    /// UID STORE +FLAGS.
    fn add_flag(
        &mut self,
        uids: &[Uid],
        flag: Flag,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// UID STORE -FLAGS.
    fn remove_flag(
        &mut self,
        uids: &[Uid],
        flag: Flag,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// EXPUNGE the selected mailbox.
    fn expunge(&mut self) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// UID MOVE to another mailbox.
    fn move_to(
        &mut self,
        uids: &[Uid],
        destination: &str,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// CREATE a mailbox.
    fn create_mailbox(
        &mut self,
        path: &str,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// DELETE a mailbox.
    fn delete_mailbox(
        &mut self,
        path: &str,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// RENAME a mailbox.
    fn rename_mailbox(
        &mut self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// NOOP; fails when the connection is gone.
    fn noop(&mut self) -> impl Future<Output = Result<(), MailServiceError>> + Send;

    /// LOGOUT.
    fn logout(&mut self) -> impl Future<Output = Result<(), MailServiceError>> + Send;
}

/// Opens authenticated [`MailStore`] sessions.
pub trait Connector: Send + Sync {
    /// Store type produced by this connector.
    type Store: MailStore;

    /// Connect and log in.
    fn connect(
        &self,
        config: &ServerConfig,
    ) -> impl Future<Output = Result<Self::Store, MailServiceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_kind_from_name() {
        assert_eq!(MailboxKind::from_name("INBOX"), MailboxKind::Inbox);
        assert_eq!(MailboxKind::from_name("[Gmail]/Sent Mail"), MailboxKind::Sent);
        assert_eq!(MailboxKind::from_name("Deleted Items"), MailboxKind::Trash);
        assert_eq!(MailboxKind::from_name("Junk"), MailboxKind::Spam);
        assert_eq!(MailboxKind::from_name("Projects"), MailboxKind::Regular);
    }

    #[test]
    fn test_mailbox_info_name_uses_delimiter() {
        let info = MailboxInfo::new("Work/Clients/Acme", Some("/"));
        assert_eq!(info.name, "Acme");
        assert_eq!(info.path, "Work/Clients/Acme");

        let flat = MailboxInfo::new("INBOX", None);
        assert_eq!(flat.name, "INBOX");
        assert_eq!(flat.kind, MailboxKind::Inbox);
    }

    #[test]
    fn test_address_forms() {
        let named = Address {
            name: Some("Ann Lee".into()),
            email: "ann@example.com".into(),
        };
        assert_eq!(named.to_string(), "Ann Lee <ann@example.com>");
        assert_eq!(named.short(), "ann@example.com");

        let name_only = Address {
            name: Some("Undisclosed".into()),
            email: String::new(),
        };
        assert_eq!(name_only.short(), "Undisclosed");

        assert_eq!(
            join_short(&[named, Address::new(""), Address::new("bob@example.com")]),
            "ann@example.com, bob@example.com"
        );
    }
}
