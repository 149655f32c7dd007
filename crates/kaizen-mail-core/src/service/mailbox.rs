//! Mailbox session facade.
//!
//! [`MailboxSession`] owns the one inbound session of the client and runs
//! every remote operation through the [`RetryPolicy`].

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, info, warn};

use super::parse::{NO_SUBJECT, ParsedMessage};
use super::remote::{
    Connector, FetchedMessage, Flag, MailStore, MailboxInfo, MailboxStatus, Projection, Uid,
    join_short,
};
use super::retry::RetryPolicy;
use super::search::SearchCriteria;
use crate::account::ServerConfig;

/// Errors that can occur during mail operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailServiceError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Neither lookup found the message.
    #[error("Message not found: {0}")]
    NotFound(Uid),

    /// No session has been established.
    #[error("Not connected")]
    NotConnected,

    /// The operation needs an open mailbox.
    #[error("No mailbox is open")]
    NoMailboxOpen,
}

/// Connection state shown in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Session established.
    Connected,
    /// No session.
    #[default]
    Disconnected,
    /// Replacing the session.
    Reconnecting,
}

/// One row of the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Message UID.
    pub uid: Uid,
    /// Subject, never empty.
    pub subject: String,
    /// Sender addresses.
    pub from: String,
    /// INTERNALDATE.
    pub date: Option<DateTime<Utc>>,
    /// `\Seen` is set.
    pub seen: bool,
    /// `\Flagged` is set.
    pub flagged: bool,
}

impl From<FetchedMessage> for MessageSummary {
    fn from(message: FetchedMessage) -> Self {
        let envelope = message.envelope.unwrap_or_default();
        Self {
            uid: message.uid,
            subject: envelope
                .subject
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_SUBJECT.to_string()),
            from: join_short(&envelope.from),
            date: message.internal_date,
            seen: message.seen,
            flagged: message.flagged,
        }
    }
}

/// Sort newest first; messages without a date sort last.
fn sort_newest_first(summaries: &mut [MessageSummary]) {
    summaries.sort_by_key(|s| std::cmp::Reverse(s.date.map_or(0, |d| d.timestamp_millis())));
}

/// Retried operations against one authenticated session and its open
/// mailbox.
///
/// The session is replaced wholesale on [`MailboxSession::reconnect`].
pub struct MailboxSession<C: Connector> {
    connector: C,
    config: ServerConfig,
    retry: RetryPolicy,
    store: Option<C::Store>,
    mailbox: Option<String>,
    status: ConnectionStatus,
}

impl<C: Connector> std::fmt::Debug for MailboxSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSession")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("mailbox", &self.mailbox)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> MailboxSession<C> {
    /// A disconnected session for `config`.
    #[must_use]
    pub fn new(connector: C, config: ServerConfig) -> Self {
        Self {
            connector,
            config,
            retry: RetryPolicy::default(),
            store: None,
            mailbox: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current connection state.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Path of the open mailbox.
    #[must_use]
    pub fn current_mailbox(&self) -> Option<&str> {
        self.mailbox.as_deref()
    }

    /// Establish the session if there is none.
    ///
    /// # Errors
    ///
    /// Returns the last connection error after retries.
    pub async fn connect(&mut self) -> Result<(), MailServiceError> {
        if self.store.is_some() {
            return Ok(());
        }
        let connector = &self.connector;
        let config = &self.config;
        match self.retry.run(|| connector.connect(config)).await {
            Ok(store) => {
                self.store = Some(store);
                self.status = ConnectionStatus::Connected;
                info!(host = %self.config.host, "Mailbox session connected");
                Ok(())
            }
            Err(e) => {
                self.status = ConnectionStatus::Disconnected;
                Err(e)
            }
        }
    }

    /// Sign off the current session (best effort), connect a fresh one and
    /// reopen the mailbox that was open before.
    ///
    /// # Errors
    ///
    /// Returns an error if the new session cannot be established or the
    /// previous mailbox cannot be reopened.
    pub async fn reconnect(&mut self) -> Result<(), MailServiceError> {
        self.status = ConnectionStatus::Reconnecting;
        if let Some(mut old) = self.store.take()
            && let Err(e) = old.logout().await
        {
            warn!("Ignoring logout error during reconnect: {e}");
        }

        self.connect().await?;
        if let Some(path) = self.mailbox.clone() {
            self.open_mailbox(&path).await?;
        }
        Ok(())
    }

    /// Log out and drop the session.
    pub async fn disconnect(&mut self) {
        if let Some(mut store) = self.store.take()
            && let Err(e) = store.logout().await
        {
            warn!("Ignoring logout error on disconnect: {e}");
        }
        self.mailbox = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Send one NOOP, without retries. `false` when not connected or the
    /// server did not answer.
    pub async fn ping(&mut self) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        match store.noop().await {
            Ok(()) => true,
            Err(e) => {
                debug!("NOOP failed: {e}");
                false
            }
        }
    }

    fn store(&mut self) -> Result<&mut C::Store, MailServiceError> {
        self.store.as_mut().ok_or(MailServiceError::NotConnected)
    }

    fn open_store(&mut self) -> Result<&mut C::Store, MailServiceError> {
        if self.mailbox.is_none() {
            return Err(MailServiceError::NoMailboxOpen);
        }
        self.store()
    }

    /// List all mailboxes.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the operation fails after retries.
    pub async fn list_mailboxes(&mut self) -> Result<Vec<MailboxInfo>, MailServiceError> {
        let retry = self.retry;
        let store = self.store()?;
        retry.run_on(store, |s| s.list_mailboxes().boxed()).await
    }

    /// Open a mailbox; later operations apply to it.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the operation fails after retries.
    pub async fn open_mailbox(&mut self, path: &str) -> Result<MailboxStatus, MailServiceError> {
        let retry = self.retry;
        let store = self.store()?;
        let status = retry
            .run_on(store, |s| {
                let path = path.to_string();
                async move { s.select(&path).await }.boxed()
            })
            .await?;
        debug!(path, exists = status.exists, "Opened mailbox");
        self.mailbox = Some(path.to_string());
        Ok(status)
    }

    /// UIDs of every message in the open mailbox, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the search fails.
    pub async fn list_uids(&mut self) -> Result<Vec<Uid>, MailServiceError> {
        self.search(&SearchCriteria::all()).await
    }

    /// Summaries of the newest `limit` messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the operation fails.
    pub async fn list_recent(
        &mut self,
        limit: usize,
    ) -> Result<Vec<MessageSummary>, MailServiceError> {
        let retry = self.retry;
        let store = self.open_store()?;
        let fetched = retry
            .run_on(store, |s| {
                async move {
                    let uids = s.search("ALL").await?;
                    let newest = &uids[uids.len().saturating_sub(limit)..];
                    s.fetch(newest, Projection::Summary).await
                }
                .boxed()
            })
            .await?;
        Ok(summarize(fetched))
    }

    /// Summaries for the given UIDs, newest first. Empty input makes no
    /// remote call.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the fetch fails.
    pub async fn list_by_uids(
        &mut self,
        uids: &[Uid],
    ) -> Result<Vec<MessageSummary>, MailServiceError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let retry = self.retry;
        let store = self.open_store()?;
        let fetched = retry
            .run_on(store, |s| {
                let uids = uids.to_vec();
                async move { s.fetch(&uids, Projection::Summary).await }.boxed()
            })
            .await?;
        Ok(summarize(fetched))
    }

    /// UIDs matching `criteria`, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the search fails.
    pub async fn search(
        &mut self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Uid>, MailServiceError> {
        let query = criteria.to_imap_query();
        debug!(%query, "Searching");
        let retry = self.retry;
        let store = self.open_store()?;
        retry
            .run_on(store, |s| {
                let query = query.clone();
                async move { s.search(&query).await }.boxed()
            })
            .await
    }

    /// Fetch one message with its full source.
    ///
    /// Tries a UID fetch, then a sequence-number fetch.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::NotFound`] when both lookups come back
    /// empty; other failures after retries.
    pub async fn fetch_message(&mut self, uid: Uid) -> Result<ParsedMessage, MailServiceError> {
        let retry = self.retry;
        let store = self.open_store()?;
        let found = retry
            .run_on(store, |s| {
                async move {
                    let by_uid = s.fetch(&[uid], Projection::Full).await?;
                    if let Some(message) = by_uid.into_iter().next() {
                        return Ok(Some(message));
                    }
                    debug!(uid, "UID fetch empty, trying sequence number");
                    Ok(s.fetch_sequence(uid, Projection::Full).await?.into_iter().next())
                }
                .boxed()
            })
            .await?;

        found
            .map(ParsedMessage::from_fetched)
            .ok_or(MailServiceError::NotFound(uid))
    }

    /// Set or clear `\Seen`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn set_seen(&mut self, uids: &[Uid], seen: bool) -> Result<(), MailServiceError> {
        self.set_flag(uids, Flag::Seen, seen).await
    }

    /// Set or clear `\Flagged`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn set_flagged(
        &mut self,
        uids: &[Uid],
        flagged: bool,
    ) -> Result<(), MailServiceError> {
        self.set_flag(uids, Flag::Flagged, flagged).await
    }

    async fn set_flag(
        &mut self,
        uids: &[Uid],
        flag: Flag,
        on: bool,
    ) -> Result<(), MailServiceError> {
        if uids.is_empty() {
            return Ok(());
        }
        let retry = self.retry;
        let store = self.open_store()?;
        retry
            .run_on(store, |s| {
                let uids = uids.to_vec();
                async move {
                    if on {
                        s.add_flag(&uids, flag).await
                    } else {
                        s.remove_flag(&uids, flag).await
                    }
                }
                .boxed()
            })
            .await
    }

    /// Mark `\Deleted` and expunge.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn delete(&mut self, uids: &[Uid]) -> Result<(), MailServiceError> {
        if uids.is_empty() {
            return Ok(());
        }
        let retry = self.retry;
        let store = self.open_store()?;
        retry
            .run_on(store, |s| {
                let uids = uids.to_vec();
                async move {
                    s.add_flag(&uids, Flag::Deleted).await?;
                    s.expunge().await
                }
                .boxed()
            })
            .await?;
        info!(count = uids.len(), "Deleted messages");
        Ok(())
    }

    /// Move messages to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn move_to(
        &mut self,
        uids: &[Uid],
        destination: &str,
    ) -> Result<(), MailServiceError> {
        if uids.is_empty() {
            return Ok(());
        }
        let retry = self.retry;
        let store = self.open_store()?;
        retry
            .run_on(store, |s| {
                let uids = uids.to_vec();
                let destination = destination.to_string();
                async move { s.move_to(&uids, &destination).await }.boxed()
            })
            .await?;
        info!(count = uids.len(), destination, "Moved messages");
        Ok(())
    }

    /// Create a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn create_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        let retry = self.retry;
        let store = self.store()?;
        retry
            .run_on(store, |s| {
                let path = path.to_string();
                async move { s.create_mailbox(&path).await }.boxed()
            })
            .await
    }

    /// Delete a mailbox. Deleting the open mailbox closes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn delete_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        let retry = self.retry;
        let store = self.store()?;
        retry
            .run_on(store, |s| {
                let path = path.to_string();
                async move { s.delete_mailbox(&path).await }.boxed()
            })
            .await?;
        if self.mailbox.as_deref() == Some(path) {
            self.mailbox = None;
        }
        Ok(())
    }

    /// Rename a mailbox. Renaming the open mailbox follows the new name.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails after retries.
    pub async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<(), MailServiceError> {
        let retry = self.retry;
        let store = self.store()?;
        retry
            .run_on(store, |s| {
                let (from, to) = (from.to_string(), to.to_string());
                async move { s.rename_mailbox(&from, &to).await }.boxed()
            })
            .await?;
        if self.mailbox.as_deref() == Some(from) {
            self.mailbox = Some(to.to_string());
        }
        Ok(())
    }
}

fn summarize(fetched: Vec<FetchedMessage>) -> Vec<MessageSummary> {
    let mut summaries: Vec<MessageSummary> =
        fetched.into_iter().map(MessageSummary::from).collect();
    sort_newest_first(&mut summaries);
    summaries
}
