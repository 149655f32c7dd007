//! IMAP adapter: [`MailStore`] over `async-imap`.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_imap::Session;
use async_imap::imap_proto;
use async_imap::types::{Fetch, Name, NameAttribute};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use super::MailServiceError;
use super::remote::{
    Address, Connector, Envelope, FetchedMessage, Flag, MailStore, MailboxInfo, MailboxKind,
    MailboxStatus, Projection, Uid,
};
use crate::account::ServerConfig;

/// Default time allowed for TCP connect, TLS handshake and greeting.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// TLS connector with an explicit crypto provider; lettre links a second
/// provider into the same rustls build.
fn tls_connector() -> Result<TlsConnector, MailServiceError> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MailServiceError::Connection(format!("TLS setup failed: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn open_stream(config: &ServerConfig) -> Result<ImapStream, MailServiceError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            MailServiceError::Connection(format!("{}:{}: {e}", config.host, config.port))
        })?;

    if !config.secure {
        return Ok(ImapStream::Plain(tcp));
    }

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| MailServiceError::Connection(format!("invalid host {}: {e}", config.host)))?;
    let tls = tls_connector()?
        .connect(server_name, tcp)
        .await
        .map_err(|e| MailServiceError::Connection(format!("TLS handshake failed: {e}")))?;
    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Opens [`ImapStore`] sessions.
#[derive(Debug, Clone, Copy)]
pub struct ImapConnector {
    connect_timeout: Duration,
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ImapConnector {
    /// Connector with a custom connect timeout.
    #[must_use]
    pub const fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn login(config: &ServerConfig) -> Result<ImapStore, MailServiceError> {
        let stream = open_stream(config).await?;
        let mut client = async_imap::Client::new(stream);
        read_greeting(&mut client).await?;

        let session = client
            .login(&config.user, &config.password)
            .await
            .map_err(|(e, _)| MailServiceError::Authentication(e.to_string()))?;

        info!(host = %config.host, user = %config.user, "IMAP session established");
        Ok(ImapStore { session })
    }
}

/// Wait for the untagged server greeting that precedes LOGIN.
async fn read_greeting<T>(client: &mut async_imap::Client<T>) -> Result<(), MailServiceError>
where
    T: AsyncRead + AsyncWrite + Unpin + std::fmt::Debug + Send,
{
    client
        .read_response()
        .await
        .ok_or_else(|| MailServiceError::Connection("connection closed before greeting".into()))?
        .map_err(|e| MailServiceError::Connection(format!("failed to read greeting: {e}")))?;
    Ok(())
}

impl Connector for ImapConnector {
    type Store = ImapStore;

    async fn connect(&self, config: &ServerConfig) -> Result<ImapStore, MailServiceError> {
        debug!(
            host = %config.host,
            port = config.port,
            secure = config.secure,
            "Connecting to IMAP server"
        );
        tokio::time::timeout(self.connect_timeout, Self::login(config))
            .await
            .map_err(|_| {
                MailServiceError::Connection(format!(
                    "timed out connecting to {}:{}",
                    config.host, config.port
                ))
            })?
    }
}

/// An authenticated `async-imap` session.
pub struct ImapStore {
    session: Session<ImapStream>,
}

impl std::fmt::Debug for ImapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore").finish_non_exhaustive()
    }
}

fn imap_err(e: async_imap::error::Error) -> MailServiceError {
    match e {
        async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost => {
            MailServiceError::Connection(e.to_string())
        }
        other => MailServiceError::Operation(other.to_string()),
    }
}

const fn fetch_query(projection: Projection) -> &'static str {
    match projection {
        Projection::Summary => "(UID FLAGS ENVELOPE INTERNALDATE)",
        Projection::Full => "(UID FLAGS ENVELOPE INTERNALDATE BODY.PEEK[])",
    }
}

/// Format UIDs as an IMAP sequence set, collapsing runs (`1:3,7`).
#[must_use]
pub fn uid_set(uids: &[Uid]) -> String {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;
    for uid in iter {
        if uid == end + 1 {
            end = uid;
        } else {
            parts.push(range(start, end));
            start = uid;
            end = uid;
        }
    }
    parts.push(range(start, end));
    parts.join(",")
}

fn range(start: Uid, end: Uid) -> String {
    if start == end { start.to_string() } else { format!("{start}:{end}") }
}

fn lossy(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(|b| String::from_utf8_lossy(b).into_owned())
}

/// Decode RFC 2047 encoded words by parsing the value as a header.
fn decode_words(input: &str) -> String {
    let header = format!("Subject: {input}");
    mailparse::parse_header(header.as_bytes())
        .map_or_else(|_| input.to_string(), |(parsed, _)| parsed.get_value())
}

fn convert_addresses(list: Option<&Vec<imap_proto::Address<'_>>>) -> Vec<Address> {
    list.map(|addrs| {
        addrs
            .iter()
            .filter(|a| a.mailbox.is_some())
            .map(|a| {
                let mailbox = lossy(a.mailbox.as_deref()).unwrap_or_default();
                let email = match lossy(a.host.as_deref()) {
                    Some(host) if !host.is_empty() => format!("{mailbox}@{host}"),
                    _ => mailbox,
                };
                Address {
                    name: lossy(a.name.as_deref()).map(|n| decode_words(&n)),
                    email,
                }
            })
            .collect()
    })
    .unwrap_or_default()
}

fn convert_envelope(envelope: &imap_proto::Envelope<'_>) -> Envelope {
    Envelope {
        subject: lossy(envelope.subject.as_deref()).map(|s| decode_words(&s)),
        from: convert_addresses(envelope.from.as_ref()),
        to: convert_addresses(envelope.to.as_ref()),
        cc: convert_addresses(envelope.cc.as_ref()),
        date: lossy(envelope.date.as_deref())
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        message_id: lossy(envelope.message_id.as_deref()),
    }
}

fn convert_fetch(fetch: &Fetch) -> Option<FetchedMessage> {
    let uid = fetch.uid?;
    let mut message = FetchedMessage {
        uid,
        envelope: fetch.envelope().map(convert_envelope),
        internal_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        source: fetch.body().map(<[u8]>::to_vec),
        ..FetchedMessage::default()
    };
    for flag in fetch.flags() {
        match flag {
            async_imap::types::Flag::Seen => message.seen = true,
            async_imap::types::Flag::Flagged => message.flagged = true,
            _ => {}
        }
    }
    Some(message)
}

fn convert_name(name: &Name) -> MailboxInfo {
    let mut info = MailboxInfo::new(name.name(), name.delimiter());
    for attribute in name.attributes() {
        match attribute {
            NameAttribute::NoSelect => info.selectable = false,
            NameAttribute::Sent => info.kind = MailboxKind::Sent,
            NameAttribute::Drafts => info.kind = MailboxKind::Drafts,
            NameAttribute::Trash => info.kind = MailboxKind::Trash,
            NameAttribute::Junk => info.kind = MailboxKind::Spam,
            NameAttribute::Archive => info.kind = MailboxKind::Archive,
            _ => {}
        }
    }
    info
}

impl ImapStore {
    async fn collect_fetch(
        &mut self,
        set: String,
        projection: Projection,
        by_uid: bool,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        let query = fetch_query(projection);
        let fetches: Vec<Fetch> = if by_uid {
            self.session.uid_fetch(set, query).await.map_err(imap_err)?.try_collect().await
        } else {
            self.session.fetch(set, query).await.map_err(imap_err)?.try_collect().await
        }
        .map_err(imap_err)?;
        Ok(fetches.iter().filter_map(convert_fetch).collect())
    }

    async fn store_flag(
        &mut self,
        uids: &[Uid],
        flag: Flag,
        sign: char,
    ) -> Result<(), MailServiceError> {
        if uids.is_empty() {
            return Ok(());
        }
        let query = format!("{sign}FLAGS ({})", flag.as_imap());
        let _: Vec<Fetch> = self
            .session
            .uid_store(uid_set(uids), &query)
            .await
            .map_err(imap_err)?
            .try_collect()
            .await
            .map_err(imap_err)?;
        Ok(())
    }
}

impl MailStore for ImapStore {
    async fn list_mailboxes(&mut self) -> Result<Vec<MailboxInfo>, MailServiceError> {
        let names: Vec<Name> = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(imap_err)?
            .try_collect()
            .await
            .map_err(imap_err)?;
        Ok(names.iter().map(convert_name).collect())
    }

    async fn select(&mut self, path: &str) -> Result<MailboxStatus, MailServiceError> {
        let mailbox = self.session.select(path).await.map_err(imap_err)?;
        Ok(MailboxStatus {
            exists: mailbox.exists,
            unseen: mailbox.unseen,
            uid_validity: mailbox.uid_validity,
        })
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Uid>, MailServiceError> {
        let found = self.session.uid_search(query).await.map_err(imap_err)?;
        let mut uids: Vec<Uid> = found.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch(
        &mut self,
        uids: &[Uid],
        projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        self.collect_fetch(uid_set(uids), projection, true).await
    }

    async fn fetch_sequence(
        &mut self,
        seq: u32,
        projection: Projection,
    ) -> Result<Vec<FetchedMessage>, MailServiceError> {
        self.collect_fetch(seq.to_string(), projection, false).await
    }

    async fn add_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.store_flag(uids, flag, '+').await
    }

    async fn remove_flag(&mut self, uids: &[Uid], flag: Flag) -> Result<(), MailServiceError> {
        self.store_flag(uids, flag, '-').await
    }

    async fn expunge(&mut self) -> Result<(), MailServiceError> {
        let _: Vec<u32> = self
            .session
            .expunge()
            .await
            .map_err(imap_err)?
            .try_collect()
            .await
            .map_err(imap_err)?;
        Ok(())
    }

    async fn move_to(&mut self, uids: &[Uid], destination: &str) -> Result<(), MailServiceError> {
        if uids.is_empty() {
            return Ok(());
        }
        self.session.uid_mv(uid_set(uids), destination).await.map_err(imap_err)
    }

    async fn create_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        self.session.create(path).await.map_err(imap_err)
    }

    async fn delete_mailbox(&mut self, path: &str) -> Result<(), MailServiceError> {
        self.session.delete(path).await.map_err(imap_err)
    }

    async fn rename_mailbox(&mut self, from: &str, to: &str) -> Result<(), MailServiceError> {
        self.session.rename(from, to).await.map_err(imap_err)
    }

    async fn noop(&mut self) -> Result<(), MailServiceError> {
        self.session.noop().await.map_err(imap_err)
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        self.session.logout().await.map_err(imap_err)
    }
}
