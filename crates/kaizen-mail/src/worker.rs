//! Background task that owns the IMAP session.
//!
//! The UI never awaits the network directly: it sends [`Command`]s and gets
//! [`WorkerEvent`]s back as [`Message::Worker`].

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use kaizen_mail_core::service::Connector;
use kaizen_mail_core::{
    ConnectionStatus, MailBrowser, MailServiceError, MailboxSession, SearchCriteria,
};

use crate::message::{Command, ListingSnapshot, Message, WorkerEvent};

fn emit(events: &UnboundedSender<Message>, event: WorkerEvent) {
    // The receiver only goes away when the UI is shutting down.
    let _ = events.send(Message::Worker(event));
}

pub struct Worker<C: Connector> {
    session: MailboxSession<C>,
    browser: MailBrowser,
    events: UnboundedSender<Message>,
    unread: Option<usize>,
}

impl<C: Connector> Worker<C> {
    pub fn new(session: MailboxSession<C>, events: UnboundedSender<Message>) -> Self {
        Self {
            session,
            browser: MailBrowser::default(),
            events,
            unread: None,
        }
    }

    /// Process commands until the sender is dropped, then log out.
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            debug!(?command, "Worker command");
            let mut outcome = self.execute(command.clone()).await;

            if matches!(outcome, Err(MailServiceError::Connection(_)))
                && command != Command::Reconnect
            {
                outcome = self.recover(command).await;
            }

            if let Err(e) = outcome {
                warn!("Mail command failed: {e}");
                emit(&self.events, WorkerEvent::Failed(e.to_string()));
            }
            emit(&self.events, WorkerEvent::Status(self.session.status()));
        }

        self.browser.close();
        self.session.disconnect().await;
        info!("Mail worker stopped");
    }

    /// Replay `command` after a connection error, reconnecting first unless
    /// the session still answers NOOP.
    async fn recover(&mut self, command: Command) -> Result<(), MailServiceError> {
        if self.session.ping().await {
            debug!("Session still alive, replaying command");
        } else {
            warn!("Connection lost, reconnecting");
            emit(&self.events, WorkerEvent::Status(ConnectionStatus::Reconnecting));
            self.session.reconnect().await?;
        }
        self.execute(command).await
    }

    async fn execute(&mut self, command: Command) -> Result<(), MailServiceError> {
        let recount = command.changes_listing();
        let session = &mut self.session;
        match command {
            Command::Connect => {
                session.connect().await?;
                let mailboxes = session.list_mailboxes().await?;
                emit(&self.events, WorkerEvent::Mailboxes(mailboxes));
                return Ok(());
            }
            Command::Reconnect => {
                session.reconnect().await?;
                if self.browser.mailbox().is_some() {
                    self.browser.refresh(session).await?;
                    self.snapshot(true).await?;
                }
                return Ok(());
            }
            Command::ListMailboxes => {
                let mailboxes = session.list_mailboxes().await?;
                emit(&self.events, WorkerEvent::Mailboxes(mailboxes));
                return Ok(());
            }
            Command::Fetch(uid) => {
                let message = session.fetch_message(uid).await?;
                let unseen = self.browser.messages().iter().any(|m| m.uid == uid && !m.seen);
                if unseen {
                    self.browser.set_seen(session, &[uid], true).await?;
                    self.snapshot(true).await?;
                }
                emit(&self.events, WorkerEvent::Opened(Box::new(message)));
                return Ok(());
            }
            Command::CreateMailbox(path) => {
                session.create_mailbox(&path).await?;
                emit(&self.events, WorkerEvent::Notice(format!("Created {path}")));
                let mailboxes = session.list_mailboxes().await?;
                emit(&self.events, WorkerEvent::Mailboxes(mailboxes));
                return Ok(());
            }
            Command::RenameMailbox { from, to } => {
                session.rename_mailbox(&from, &to).await?;
                emit(&self.events, WorkerEvent::Notice(format!("Renamed {from} to {to}")));
                let mailboxes = session.list_mailboxes().await?;
                emit(&self.events, WorkerEvent::Mailboxes(mailboxes));
                if self.browser.mailbox() == Some(from.as_str()) {
                    self.browser.open_mailbox(session, &to).await?;
                    self.snapshot(true).await?;
                }
                return Ok(());
            }
            Command::DeleteMailbox(path) => {
                session.delete_mailbox(&path).await?;
                if self.browser.mailbox() == Some(path.as_str()) {
                    self.browser.close();
                }
                emit(&self.events, WorkerEvent::Notice(format!("Deleted {path}")));
                let mailboxes = session.list_mailboxes().await?;
                emit(&self.events, WorkerEvent::Mailboxes(mailboxes));
                return Ok(());
            }
            Command::OpenMailbox(path) => {
                let status = self.browser.open_mailbox(session, &path).await?;
                debug!(path, exists = status.exists, "Mailbox opened");
            }
            Command::Refresh => self.browser.refresh(session).await?,
            Command::NextPage => self.browser.next_page(session).await?,
            Command::PrevPage => self.browser.prev_page(session).await?,
            Command::Search(criteria) => self.browser.apply_filter(session, criteria).await?,
            Command::ClearFilter => self.browser.clear_filter(session).await?,
            Command::SetSeen(uids, seen) => self.browser.set_seen(session, &uids, seen).await?,
            Command::SetFlagged(uids, flagged) => {
                self.browser.set_flagged(session, &uids, flagged).await?;
            }
            Command::Delete(uids) => {
                self.browser.delete(session, &uids).await?;
                let notice = format!("Deleted {} message(s)", uids.len());
                emit(&self.events, WorkerEvent::Notice(notice));
            }
            Command::Move(uids, destination) => {
                self.browser.move_to(session, &uids, &destination).await?;
                let notice = format!("Moved {} message(s) to {destination}", uids.len());
                emit(&self.events, WorkerEvent::Notice(notice));
            }
        }
        self.snapshot(recount).await
    }

    /// Publish the current page; `recount` refreshes the unread total.
    async fn snapshot(&mut self, recount: bool) -> Result<(), MailServiceError> {
        if recount || self.unread.is_none() {
            self.unread = Some(self.session.search(&SearchCriteria::unseen()).await?.len());
        }
        let snapshot = ListingSnapshot {
            mailbox: self.browser.mailbox().unwrap_or_default().to_string(),
            page: self.browser.page(),
            total_pages: self.browser.total_pages(),
            total: self.browser.universe().len(),
            messages: self.browser.messages().to_vec(),
            filter: self.browser.filter().cloned(),
            unread: self.unread,
        };
        emit(&self.events, WorkerEvent::Listing(snapshot));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::DateTime;
    use kaizen_mail_core::service::remote::{
        FetchedMessage, Flag, MailStore, MailboxInfo, MailboxStatus, Projection,
    };
    use kaizen_mail_core::service::Uid;
    use kaizen_mail_core::{RetryPolicy, ServerConfig};
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct Server {
        inbox: Mutex<Vec<(Uid, bool)>>,
        drop_next: AtomicBool,
        dead: AtomicBool,
        connects: AtomicUsize,
    }

    #[derive(Debug, Clone, Default)]
    struct Fake(Arc<Server>);

    impl Fake {
        fn with(count: u32) -> Self {
            let fake = Self::default();
            *fake.0.inbox.lock().unwrap() = (1..=count).map(|uid| (uid, false)).collect();
            fake
        }
    }

    struct Store(Arc<Server>);

    impl Store {
        fn check(&self) -> Result<(), MailServiceError> {
            if self.0.dead.load(Ordering::SeqCst) {
                return Err(MailServiceError::Connection("broken pipe".into()));
            }
            if self.0.drop_next.swap(false, Ordering::SeqCst) {
                return Err(MailServiceError::Connection("reset by peer".into()));
            }
            Ok(())
        }
    }

    impl Connector for Fake {
        type Store = Store;

        async fn connect(&self, _config: &ServerConfig) -> Result<Store, MailServiceError> {
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            self.0.dead.store(false, Ordering::SeqCst);
            Ok(Store(Arc::clone(&self.0)))
        }
    }

    impl MailStore for Store {
        async fn list_mailboxes(&mut self) -> Result<Vec<MailboxInfo>, MailServiceError> {
            self.check()?;
            Ok(vec![MailboxInfo::new("INBOX", Some("/"))])
        }

        async fn select(&mut self, _path: &str) -> Result<MailboxStatus, MailServiceError> {
            self.check()?;
            let exists = u32::try_from(self.0.inbox.lock().unwrap().len()).unwrap();
            Ok(MailboxStatus {
                exists,
                ..MailboxStatus::default()
            })
        }

        async fn search(&mut self, query: &str) -> Result<Vec<Uid>, MailServiceError> {
            self.check()?;
            let inbox = self.0.inbox.lock().unwrap();
            Ok(inbox
                .iter()
                .filter(|(_, seen)| query != "UNSEEN" || !seen)
                .map(|(uid, _)| *uid)
                .collect())
        }

        async fn fetch(
            &mut self,
            uids: &[Uid],
            _projection: Projection,
        ) -> Result<Vec<FetchedMessage>, MailServiceError> {
            self.check()?;
            let inbox = self.0.inbox.lock().unwrap();
            Ok(inbox
                .iter()
                .filter(|(uid, _)| uids.contains(uid))
                .map(|(uid, seen)| FetchedMessage {
                    uid: *uid,
                    seen: *seen,
                    internal_date: DateTime::from_timestamp(i64::from(*uid) * 60, 0),
                    ..FetchedMessage::default()
                })
                .collect())
        }

        async fn fetch_sequence(
            &mut self,
            _seq: u32,
            _p: Projection,
        ) -> Result<Vec<FetchedMessage>, MailServiceError> {
            Ok(Vec::new())
        }

        async fn add_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
            self.check()?;
            if flag == Flag::Seen {
                for (uid, seen) in self.0.inbox.lock().unwrap().iter_mut() {
                    if uids.contains(uid) {
                        *seen = true;
                    }
                }
            }
            Ok(())
        }

        async fn remove_flag(
            &mut self,
            _uids: &[Uid],
            _flag: Flag,
        ) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn expunge(&mut self) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn move_to(
            &mut self,
            _uids: &[Uid],
            _destination: &str,
        ) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn create_mailbox(&mut self, _path: &str) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn delete_mailbox(&mut self, _path: &str) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn rename_mailbox(&mut self, _from: &str, _to: &str) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn noop(&mut self) -> Result<(), MailServiceError> {
            self.check()
        }

        async fn logout(&mut self) -> Result<(), MailServiceError> {
            Ok(())
        }
    }

    fn spawn(fake: &Fake) -> (mpsc::UnboundedSender<Command>, mpsc::UnboundedReceiver<Message>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let server = ServerConfig::new("imap.test", 993, true, "ann", "pw");
        let session = MailboxSession::new(fake.clone(), server)
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));
        tokio::spawn(Worker::new(session, events_tx).run(commands_rx));
        (commands_tx, events_rx)
    }

    async fn next_listing(events: &mut mpsc::UnboundedReceiver<Message>) -> ListingSnapshot {
        loop {
            match events.recv().await.unwrap() {
                Message::Worker(WorkerEvent::Listing(listing)) => return listing,
                Message::Worker(WorkerEvent::Failed(e)) => panic!("worker failed: {e}"),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_open_and_page() {
        let fake = Fake::with(45);
        let (commands, mut events) = spawn(&fake);
        commands.send(Command::Connect).unwrap();
        commands.send(Command::OpenMailbox("INBOX".into())).unwrap();

        let listing = next_listing(&mut events).await;
        assert_eq!(listing.mailbox, "INBOX");
        assert_eq!(listing.total_pages, 3);
        assert_eq!(listing.unread, Some(45));
        assert_eq!(listing.messages[0].uid, 45);

        commands.send(Command::NextPage).unwrap();
        commands.send(Command::NextPage).unwrap();
        next_listing(&mut events).await;
        let last = next_listing(&mut events).await;
        assert_eq!(last.page, 2);
        assert_eq!(last.messages.len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_marks_seen_and_recounts() {
        let fake = Fake::with(3);
        let (commands, mut events) = spawn(&fake);
        commands.send(Command::Connect).unwrap();
        commands.send(Command::OpenMailbox("INBOX".into())).unwrap();
        next_listing(&mut events).await;

        commands.send(Command::Fetch(2)).unwrap();
        let listing = next_listing(&mut events).await;
        assert_eq!(listing.unread, Some(2));
        assert!(listing.messages.iter().any(|m| m.uid == 2 && m.seen));
    }

    #[tokio::test]
    async fn test_reconnects_after_connection_loss() {
        let fake = Fake::with(3);
        let (commands, mut events) = spawn(&fake);
        commands.send(Command::Connect).unwrap();
        commands.send(Command::OpenMailbox("INBOX".into())).unwrap();
        next_listing(&mut events).await;

        fake.0.dead.store(true, Ordering::SeqCst);
        commands.send(Command::Refresh).unwrap();
        let listing = next_listing(&mut events).await;
        assert_eq!(listing.total, 3);
        assert_eq!(fake.0.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_live_session_replays_without_reconnect() {
        let fake = Fake::with(3);
        let (commands, mut events) = spawn(&fake);
        commands.send(Command::Connect).unwrap();
        commands.send(Command::OpenMailbox("INBOX".into())).unwrap();
        next_listing(&mut events).await;

        fake.0.drop_next.store(true, Ordering::SeqCst);
        commands.send(Command::Refresh).unwrap();
        let listing = next_listing(&mut events).await;
        assert_eq!(listing.total, 3);
        assert_eq!(fake.0.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_reported() {
        let fake = Fake::with(3);
        let (commands, mut events) = spawn(&fake);
        commands.send(Command::Connect).unwrap();
        commands.send(Command::Refresh).unwrap();

        loop {
            if let Message::Worker(WorkerEvent::Failed(e)) = events.recv().await.unwrap() {
                assert_eq!(e, MailServiceError::NoMailboxOpen.to_string());
                break;
            }
        }
    }
}
