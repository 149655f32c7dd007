//! Messages flowing into the application and commands flowing out to the
//! mail worker.

use ratatui::crossterm::event::KeyEvent;

use kaizen_mail_core::service::{MailboxInfo, Uid};
use kaizen_mail_core::{ConnectionStatus, MessageSummary, ParsedMessage, SearchCriteria};

/// Input to [`crate::app::App::update`].
#[derive(Debug)]
pub enum Message {
    /// Key press from the terminal.
    Key(KeyEvent),
    /// Terminal resized; only needs a redraw.
    Resize,
    /// Result reported by the mail worker.
    Worker(WorkerEvent),
    /// Outcome of sending the compose form.
    Sent(Result<String, String>),
    /// Outcome of the SMTP login check after unlocking.
    SmtpChecked(bool),
}

/// Work for the mail worker, which owns the IMAP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    ListMailboxes,
    OpenMailbox(String),
    Refresh,
    NextPage,
    PrevPage,
    Search(SearchCriteria),
    ClearFilter,
    SetSeen(Vec<Uid>, bool),
    SetFlagged(Vec<Uid>, bool),
    Delete(Vec<Uid>),
    Move(Vec<Uid>, String),
    Fetch(Uid),
    CreateMailbox(String),
    RenameMailbox { from: String, to: String },
    DeleteMailbox(String),
    Reconnect,
}

impl Command {
    /// Whether the command changes what the message list shows.
    pub const fn changes_listing(&self) -> bool {
        matches!(
            self,
            Self::Refresh
                | Self::SetSeen(..)
                | Self::SetFlagged(..)
                | Self::Delete(_)
                | Self::Move(..)
                | Self::OpenMailbox(_)
        )
    }
}

/// What the message list shows after a worker command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSnapshot {
    pub mailbox: String,
    pub page: usize,
    pub total_pages: usize,
    /// Size of the filtered (or full) UID set.
    pub total: usize,
    pub messages: Vec<MessageSummary>,
    pub filter: Option<SearchCriteria>,
    /// Unread messages in the mailbox, when known.
    pub unread: Option<usize>,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Status(ConnectionStatus),
    Mailboxes(Vec<MailboxInfo>),
    Listing(ListingSnapshot),
    Opened(Box<ParsedMessage>),
    Notice(String),
    Failed(String),
}
