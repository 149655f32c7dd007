//! In-memory stand-ins for the IMAP store and SMTP transport.
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use lettre::Message;

use super::MailServiceError;
use super::remote::{
    Address, Connector, Envelope, FetchedMessage, Flag, MailStore, MailboxInfo, MailboxStatus,
    Projection, Uid,
};
use super::smtp::{SmtpError, Transport, TransportFactory, TransportOptions};
use crate::account::ServerConfig;

#[derive(Debug, Clone, Default)]
pub struct FakeMessage {
    uid: Uid,
    subject: Option<String>,
    from: Option<String>,
    date: Option<i64>,
    source: Option<Vec<u8>>,
    seen: bool,
    flagged: bool,
}

impl FakeMessage {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            subject: Some(format!("Message {uid}")),
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = Some(from.to_string());
        self
    }

    pub const fn dated(mut self, secs: i64) -> Self {
        self.date = Some(secs);
        self
    }

    pub fn source(mut self, source: &[u8]) -> Self {
        self.source = Some(source.to_vec());
        self
    }

    fn fetched(&self, projection: Projection) -> FetchedMessage {
        FetchedMessage {
            uid: self.uid,
            envelope: Some(Envelope {
                subject: self.subject.clone(),
                from: self.from.iter().map(Address::new).collect(),
                ..Envelope::default()
            }),
            seen: self.seen,
            flagged: self.flagged,
            internal_date: self.date.and_then(|s| DateTime::from_timestamp(s, 0)),
            source: match projection {
                Projection::Summary => None,
                Projection::Full => self.source.clone(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct FakeServer {
    mailboxes: BTreeMap<String, Vec<FakeMessage>>,
    connects: u32,
    fail_connects: u32,
    fail_ops: u32,
    fail_logout: bool,
    fail_fetches: bool,
    broken_searches: BTreeSet<String>,
    calls: u32,
    last_query: Option<String>,
}

/// Shared fake IMAP server; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeConnector {
    /// Server with an INBOX holding UIDs `1..=count`, dated in UID order.
    pub fn with_inbox(count: u32) -> Self {
        let connector = Self::default();
        let messages = (1..=count)
            .map(|uid| FakeMessage::new(uid).dated(i64::from(uid) * 60))
            .collect();
        connector.lock().mailboxes.insert("INBOX".to_string(), messages);
        connector
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    pub fn add(&self, message: FakeMessage) {
        self.lock().mailboxes.entry("INBOX".to_string()).or_default().push(message);
    }

    pub fn set_seen(&self, uids: &[Uid], seen: bool) {
        let mut server = self.lock();
        for message in server.mailboxes.values_mut().flatten() {
            if uids.contains(&message.uid) {
                message.seen = seen;
            }
        }
    }

    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    pub fn last_query(&self) -> Option<String> {
        self.lock().last_query.clone()
    }

    pub fn fail_next_connects(&self, n: u32) {
        self.lock().fail_connects = n;
    }

    pub fn fail_next_ops(&self, n: u32) {
        self.lock().fail_ops = n;
    }

    pub fn fail_logout(&self, fail: bool) {
        self.lock().fail_logout = fail;
    }

    /// Every FETCH fails until switched off again.
    pub fn fail_fetches(&self, fail: bool) {
        self.lock().fail_fetches = fail;
    }

    /// Add an empty mailbox that can be selected but not searched.
    pub fn add_unsearchable(&self, path: &str) {
        let mut server = self.lock();
        server.mailboxes.entry(path.to_string()).or_default();
        server.broken_searches.insert(path.to_string());
    }
}

impl Connector for FakeConnector {
    type Store = FakeStore;

    async fn connect(&self, _config: &ServerConfig) -> Result<FakeStore, MailServiceError> {
        let mut server = self.lock();
        server.connects += 1;
        if server.fail_connects > 0 {
            server.fail_connects -= 1;
            return Err(MailServiceError::Connection("refused".into()));
        }
        Ok(FakeStore {
            server: Arc::clone(&self.server),
            selected: None,
        })
    }
}

#[derive(Debug)]
pub struct FakeStore {
    server: Arc<Mutex<FakeServer>>,
    selected: Option<String>,
}

impl FakeStore {
    /// Count the call, fail if requested, then run `f` on the server and
    /// the selected mailbox name.
    fn op<T>(
        &mut self,
        f: impl FnOnce(&mut FakeServer, &mut Option<String>) -> Result<T, MailServiceError>,
    ) -> Result<T, MailServiceError> {
        let mut server = self.server.lock().unwrap();
        server.calls += 1;
        if server.fail_ops > 0 {
            server.fail_ops -= 1;
            return Err(MailServiceError::Operation("temporary failure".into()));
        }
        f(&mut server, &mut self.selected)
    }

    fn selected<'a>(
        server: &'a mut FakeServer,
        selected: &Option<String>,
    ) -> Result<&'a mut Vec<FakeMessage>, MailServiceError> {
        selected
            .as_ref()
            .and_then(|path| server.mailboxes.get_mut(path))
            .ok_or_else(|| MailServiceError::Operation("no mailbox selected".into()))
    }
}

impl MailStore for FakeStore {
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxInfo>, MailServiceError> {
        self.op(|server, _| {
            Ok(server
                .mailboxes
                .keys()
                .map(|p| MailboxInfo::new(p.clone(), Some("/")))
                .collect())
        })
    }

    async fn select(&mut self, path: &str) -> Result<MailboxStatus, MailServiceError> {
        self.op(|server, selected| {
            let messages = server
                .mailboxes
                .get(path)
                .ok_or_else(|| MailServiceError::Operation(format!("no mailbox {path}")))?;
            *selected = Some(path.to_string());
            Ok(MailboxStatus {
                exists: u32::try_from(messages.len()).unwrap(),
                ..MailboxStatus::default()
            })
        })
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Uid>, MailServiceError> {
        self.op(|server, selected| {
            server.last_query = Some(query.to_string());
            if selected.as_ref().is_some_and(|path| server.broken_searches.contains(path)) {
                return Err(MailServiceError::Operation("SEARCH failed".into()));
            }
            let messages = Self::selected(server, selected)?;
            let mut uids: Vec<Uid> = messages
                .iter()
                .filter(|m| {
                    query.split_whitespace().all(|term| match term {
                        "UNSEEN" => !m.seen,
                        "FLAGGED" => m.flagged,
                        _ => true,
                    })
                })
                .map(|m| m.uid)
                .collect();
            uids.sort_unstable();
            Ok(uids)
        })
    }

    async fn fetch(
        &mut self,
        uids: &[Uid],
        projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        self.op(|server, selected| {
            if server.fail_fetches {
                return Err(MailServiceError::Operation("FETCH failed".into()));
            }
            let messages = Self::selected(server, selected)?;
            Ok(messages
                .iter()
                .filter(|m| uids.contains(&m.uid))
                .map(|m| m.fetched(projection))
                .collect())
        })
    }

    async fn fetch_sequence(
        &mut self,
        seq: u32,
        projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        self.op(|server, selected| {
            let messages = Self::selected(server, selected)?;
            let index = usize::try_from(seq).unwrap_or(usize::MAX).wrapping_sub(1);
            Ok(messages.get(index).map(|m| m.fetched(projection)).into_iter().collect())
        })
    }

    async fn add_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            apply_flag(Self::selected(server, selected)?, uids, flag, true);
            Ok(())
        })
    }

    async fn remove_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            apply_flag(Self::selected(server, selected)?, uids, flag, false);
            Ok(())
        })
    }

    async fn expunge(&mut self) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            Self::selected(server, selected)?
                .retain(|m| m.subject.as_deref() != Some(DELETED_MARK));
            Ok(())
        })
    }

    async fn move_to(&mut self, uids: &[Uid], destination: &str) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            let source = Self::selected(server, selected)?;
            let (moving, staying): (Vec<_>, Vec<_>) =
                source.drain(..).partition(|m| uids.contains(&m.uid));
            *source = staying;
            server
                .mailboxes
                .get_mut(destination)
                .ok_or_else(|| MailServiceError::Operation(format!("no mailbox {destination}")))?
                .extend(moving);
            Ok(())
        })
    }

    async fn create_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        self.op(|server, _| {
            server.mailboxes.entry(path.to_string()).or_default();
            Ok(())
        })
    }

    async fn delete_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            server
                .mailboxes
                .remove(path)
                .ok_or_else(|| MailServiceError::Operation(format!("no mailbox {path}")))?;
            if selected.as_deref() == Some(path) {
                *selected = None;
            }
            Ok(())
        })
    }

    async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<(), MailServiceError> {
        self.op(|server, selected| {
            let messages = server
                .mailboxes
                .remove(from)
                .ok_or_else(|| MailServiceError::Operation(format!("no mailbox {from}")))?;
            server.mailboxes.insert(to.to_string(), messages);
            if selected.as_deref() == Some(from) {
                *selected = Some(to.to_string());
            }
            Ok(())
        })
    }

    async fn noop(&mut self) -> Result<(), MailServiceError> {
        self.op(|_, _| Ok(()))
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        let fail = self.server.lock().unwrap().fail_logout;
        if fail {
            return Err(MailServiceError::Connection("socket closed".into()));
        }
        Ok(())
    }
}

/// `\Deleted` is modelled by swapping the subject for a marker.
const DELETED_MARK: &str = "\u{0}deleted";

fn apply_flag(messages: &mut [FakeMessage], uids: &[Uid], flag: Flag, on: bool) {
    for message in messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
        match flag {
            Flag::Seen => message.seen = on,
            Flag::Flagged => message.flagged = on,
            Flag::Deleted if on => message.subject = Some(DELETED_MARK.to_string()),
            Flag::Deleted => {}
        }
    }
}

/// Observable state of one fake transport, shared with the factory.
#[derive(Debug, Default)]
pub struct TransportStats {
    dead: AtomicBool,
    reject_sends: AtomicBool,
    verifies: AtomicUsize,
    closes: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl TransportStats {
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }

    /// Formatted messages, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

/// Transport that records what it sends.
#[derive(Debug)]
pub struct FakeTransport {
    id: usize,
    stats: Arc<TransportStats>,
}

impl FakeTransport {
    pub const fn id(&self) -> usize {
        self.id
    }
}

impl Transport for FakeTransport {
    async fn verify(&self) -> Result<(), SmtpError> {
        // A real NOOP round trip suspends; concurrent callers interleave here.
        tokio::task::yield_now().await;
        self.stats.verifies.fetch_add(1, Ordering::SeqCst);
        if self.stats.dead.load(Ordering::SeqCst) {
            Err(SmtpError::Connection("connection reset".into()))
        } else {
            Ok(())
        }
    }

    async fn send(&self, message: Message) -> Result<String, SmtpError> {
        if self.stats.reject_sends.load(Ordering::SeqCst) {
            return Err(SmtpError::Send("554 rejected".into()));
        }
        let text = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.stats.sent.lock().unwrap().push(text);
        Ok(format!("250 queued as {}", self.id))
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    stats: Vec<Arc<TransportStats>>,
    next_dead: bool,
    next_rejects: bool,
}

/// Factory that hands out [`FakeTransport`]s and keeps their stats.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl FakeFactory {
    /// Transports created so far.
    pub fn created(&self) -> usize {
        self.state.lock().unwrap().stats.len()
    }

    /// Counters of the `index`-th created transport.
    pub fn stats(&self, index: usize) -> Arc<TransportStats> {
        Arc::clone(&self.state.lock().unwrap().stats[index])
    }

    /// The next transport fails verification.
    pub fn next_dead(&self) {
        self.state.lock().unwrap().next_dead = true;
    }

    /// The next transport rejects sends.
    pub fn next_rejects(&self) {
        self.state.lock().unwrap().next_rejects = true;
    }
}

impl TransportFactory for FakeFactory {
    type Transport = FakeTransport;

    fn create(
        &self,
        _server: &ServerConfig,
        _options: &TransportOptions,
    ) -> Result<FakeTransport, SmtpError> {
        let mut state = self.state.lock().unwrap();
        let stats = Arc::new(TransportStats::default());
        stats.dead.store(std::mem::take(&mut state.next_dead), Ordering::SeqCst);
        stats
            .reject_sends
            .store(std::mem::take(&mut state.next_rejects), Ordering::SeqCst);
        state.stats.push(Arc::clone(&stats));
        Ok(FakeTransport {
            id: state.stats.len() - 1,
            stats,
        })
    }
}
