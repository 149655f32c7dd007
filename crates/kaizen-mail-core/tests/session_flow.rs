//! End-to-end flows through the public API with an in-memory server.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use kaizen_mail_core::service::remote::{
    Connector, Envelope, FetchedMessage, Flag, MailStore, MailboxInfo, MailboxStatus, Projection,
};
use kaizen_mail_core::service::{Transport, TransportFactory, Uid};
use kaizen_mail_core::{
    Account, ConfigStore, ConnectionPool, DraftStore, MailBrowser, MailServiceError, MailboxSession,
    OutgoingMessage, PoolConfig, RetryPolicy, SearchCriteria, ServerConfig, SmtpError,
    TransportOptions, compose,
};
use lettre::Message;

#[derive(Debug, Clone)]
struct Stored {
    uid: Uid,
    seen: bool,
}

#[derive(Debug, Default)]
struct Server {
    mailboxes: BTreeMap<String, Vec<Stored>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryConnector(Arc<Mutex<Server>>);

impl MemoryConnector {
    fn inbox(messages: Vec<Stored>) -> Self {
        let connector = Self::default();
        connector.0.lock().unwrap().mailboxes.insert("INBOX".into(), messages);
        connector
    }
}

impl Connector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self, _config: &ServerConfig) -> Result<MemoryStore, MailServiceError> {
        Ok(MemoryStore {
            server: Arc::clone(&self.0),
            selected: String::new(),
        })
    }
}

#[derive(Debug)]
struct MemoryStore {
    server: Arc<Mutex<Server>>,
    selected: String,
}

impl MemoryStore {
    fn with_selected<T>(
        &self,
        f: impl FnOnce(&mut Vec<Stored>) -> T,
    ) -> Result<T, MailServiceError> {
        let mut server = self.server.lock().unwrap();
        let messages = server
            .mailboxes
            .get_mut(&self.selected)
            .ok_or(MailServiceError::NoMailboxOpen)?;
        Ok(f(messages))
    }
}

fn fetched(message: &Stored) -> FetchedMessage {
    FetchedMessage {
        uid: message.uid,
        envelope: Some(Envelope {
            subject: Some(format!("Message {}", message.uid)),
            ..Envelope::default()
        }),
        seen: message.seen,
        internal_date: DateTime::from_timestamp(i64::from(message.uid) * 3600, 0),
        ..FetchedMessage::default()
    }
}

impl MailStore for MemoryStore {
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxInfo>, MailServiceError> {
        let server = self.server.lock().unwrap();
        Ok(server.mailboxes.keys().map(|p| MailboxInfo::new(p.clone(), Some("/"))).collect())
    }

    async fn select(&mut self, path: &str) -> Result<MailboxStatus, MailServiceError> {
        if !self.server.lock().unwrap().mailboxes.contains_key(path) {
            return Err(MailServiceError::Operation(format!("no mailbox {path}")));
        }
        self.selected = path.to_string();
        Ok(MailboxStatus::default())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Uid>, MailServiceError> {
        let unseen_only = query == "UNSEEN";
        self.with_selected(|messages| {
            messages
                .iter()
                .filter(|m| !unseen_only || !m.seen)
                .map(|m| m.uid)
                .collect()
        })
    }

    async fn fetch(
        &mut self,
        uids: &[Uid],
        _projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        self.with_selected(|messages| {
            messages
                .iter()
                .filter(|m| uids.contains(&m.uid))
                .map(fetched)
                .collect()
        })
    }

    async fn fetch_sequence(
        &mut self,
        _seq: u32,
        _projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        Ok(Vec::new())
    }

    async fn add_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.with_selected(|messages| {
            for message in messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
                if flag == Flag::Seen {
                    message.seen = true;
                }
            }
        })
    }

    async fn remove_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.with_selected(|messages| {
            for message in messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
                if flag == Flag::Seen {
                    message.seen = false;
                }
            }
        })
    }

    async fn expunge(&mut self) -> Result<(), MailServiceError> {
        Ok(())
    }

    async fn move_to(&mut self, _uids: &[Uid], _destination: &str) -> Result<(), MailServiceError> {
        Err(MailServiceError::Operation("MOVE not supported".into()))
    }

    async fn create_mailbox(&mut self, _path: &str) -> Result<(), MailServiceError> {
        Ok(())
    }

    async fn delete_mailbox(&mut self, _path: &str) -> Result<(), MailServiceError> {
        Ok(())
    }

    async fn rename_mailbox(&mut self, _from: &str, _to: &str) -> Result<(), MailServiceError> {
        Ok(())
    }

    async fn noop(&mut self) -> Result<(), MailServiceError> {
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        Ok(())
    }
}

fn messages(count: Uid, seen: bool) -> Vec<Stored> {
    (1..=count).map(|uid| Stored { uid, seen }).collect()
}

async fn connected(connector: &MemoryConnector) -> MailboxSession<MemoryConnector> {
    let mut session = MailboxSession::new(connector.clone(), ServerConfig::default())
        .with_retry(RetryPolicy::new(3, Duration::from_millis(5)));
    session.connect().await.unwrap();
    session
}

fn page_uids(browser: &MailBrowser) -> Vec<Uid> {
    let mut uids: Vec<Uid> = browser.messages().iter().map(|m| m.uid).collect();
    uids.sort_unstable();
    uids
}

#[tokio::test]
async fn test_forty_five_messages_in_pages_of_twenty() {
    let connector = MemoryConnector::inbox(messages(45, true));
    let mut session = connected(&connector).await;
    let mut browser = MailBrowser::new(20);

    browser.open_mailbox(&mut session, "INBOX").await.unwrap();
    assert_eq!(browser.total_pages(), 3);
    assert_eq!(page_uids(&browser), (26..=45).collect::<Vec<_>>());
    assert_eq!(browser.messages()[0].uid, 45);

    browser.next_page(&mut session).await.unwrap();
    assert_eq!(page_uids(&browser), (6..=25).collect::<Vec<_>>());

    browser.next_page(&mut session).await.unwrap();
    assert_eq!(page_uids(&browser), (1..=5).collect::<Vec<_>>());

    browser.next_page(&mut session).await.unwrap();
    assert_eq!(browser.page(), 2);
}

#[tokio::test]
async fn test_unseen_search_narrows_the_universe() {
    let mut inbox = messages(10, true);
    inbox.extend((11..=13).map(|uid| Stored { uid, seen: false }));
    let connector = MemoryConnector::inbox(inbox);
    let mut session = connected(&connector).await;
    let mut browser = MailBrowser::default();
    browser.open_mailbox(&mut session, "INBOX").await.unwrap();

    let criteria = SearchCriteria::unseen();
    assert_eq!(session.search(&criteria).await.unwrap(), vec![11, 12, 13]);

    browser.apply_filter(&mut session, criteria).await.unwrap();
    assert_eq!(browser.page(), 0);
    assert_eq!(page_uids(&browser), vec![11, 12, 13]);
    assert!(browser.messages().iter().all(|m| !m.seen));

    browser.set_seen(&mut session, &[12], true).await.unwrap();
    assert_eq!(page_uids(&browser), vec![11, 13]);
}

#[tokio::test(start_paused = true)]
async fn test_move_failure_surfaces_after_retries() {
    let connector = MemoryConnector::inbox(messages(3, false));
    let mut session = connected(&connector).await;
    session.open_mailbox("INBOX").await.unwrap();

    let result = session.move_to(&[1], "Archive").await;
    assert!(matches!(result, Err(MailServiceError::Operation(_))));
}

#[tokio::test]
async fn test_missing_message_is_not_found() {
    let connector = MemoryConnector::inbox(messages(3, false));
    let mut session = connected(&connector).await;
    session.open_mailbox("INBOX").await.unwrap();

    assert_eq!(session.fetch_message(99).await, Err(MailServiceError::NotFound(99)));
    let found = session.fetch_message(2).await.unwrap();
    assert_eq!(found.subject, "Message 2");
    assert!(found.raw.is_none());
}

#[derive(Debug, Default)]
struct Outbox {
    created: usize,
    sent: Vec<String>,
    closed: usize,
}

#[derive(Debug, Clone, Default)]
struct RecordingFactory(Arc<Mutex<Outbox>>);

#[derive(Debug)]
struct RecordingTransport(Arc<Mutex<Outbox>>);

impl Transport for RecordingTransport {
    async fn verify(&self) -> Result<(), SmtpError> {
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<String, SmtpError> {
        let text = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.0.lock().unwrap().sent.push(text);
        Ok("250 OK".into())
    }

    async fn close(&self) {
        self.0.lock().unwrap().closed += 1;
    }
}

impl TransportFactory for RecordingFactory {
    type Transport = RecordingTransport;

    fn create(
        &self,
        _server: &ServerConfig,
        _options: &TransportOptions,
    ) -> Result<RecordingTransport, SmtpError> {
        self.0.lock().unwrap().created += 1;
        Ok(RecordingTransport(Arc::clone(&self.0)))
    }
}

fn account() -> Account {
    let mut account = Account::with_email("ann@gmail.com");
    account.display_name = "Ann".into();
    account.smtp.password = "app-password".into();
    account
}

#[tokio::test]
async fn test_reply_sent_through_pool() {
    let factory = RecordingFactory::default();
    let pool = ConnectionPool::new(
        factory.clone(),
        TransportOptions::default(),
        PoolConfig::default(),
    );

    let connector = MemoryConnector::inbox(messages(1, false));
    let mut session = connected(&connector).await;
    session.open_mailbox("INBOX").await.unwrap();
    let original = session.fetch_message(1).await.unwrap();

    let mut form = compose::reply_to(&original);
    form.to = "bob@example.com".into();
    form.body = format!("Sounds good.{}", form.body);
    pool.send_mail(&account(), form.to_outgoing(None)).await.unwrap();
    pool.send_mail(&account(), OutgoingMessage::new("bob@example.com", "Again", "x"))
        .await
        .unwrap();

    pool.shutdown().await;
    let outbox = factory.0.lock().unwrap();
    assert_eq!(outbox.created, 1);
    assert_eq!(outbox.sent.len(), 2);
    assert!(outbox.sent[0].contains("Subject: Re: Message 1"));
    assert_eq!(outbox.closed, 1);
}

#[test]
fn test_config_and_drafts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = ConfigStore::open(dir.path(), "correct horse").unwrap();
    store.save(&kaizen_mail_core::Config::new(account())).unwrap();
    store.set_last_selected_mailbox("Archive").unwrap();

    let drafts = DraftStore::open(dir.path(), "correct horse").unwrap();
    let form = compose::ComposeForm {
        to: "bob@example.com".into(),
        subject: "Plan".into(),
        body: "Draft body".into(),
        ..compose::ComposeForm::default()
    };
    let saved = drafts.save(form.to_draft_input()).unwrap();

    let reopened = ConfigStore::open(dir.path(), "correct horse").unwrap();
    let config = reopened.load().unwrap().unwrap();
    assert_eq!(config.account.email, "ann@gmail.com");
    assert_eq!(config.last_selected_mailbox.as_deref(), Some("Archive"));

    let reopened = DraftStore::open(dir.path(), "correct horse").unwrap();
    let draft = reopened.get(&saved.id).unwrap().unwrap();
    assert_eq!(compose::ComposeForm::from(draft).body, "Draft body");

    let locked = ConfigStore::open(dir.path(), "wrong").unwrap();
    assert!(locked.load().is_err());
}
