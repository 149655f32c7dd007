//! Outgoing mail: message building and the SMTP transport.
//!
//! The pool in [`super::pool`] only sees the [`Transport`] trait. The real
//! implementation is [`LettreTransport`], built by [`LettreFactory`].

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::{self, PoolConfig as LettrePoolConfig};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::account::{Account, ServerConfig};

/// Content type used when an attachment does not name one.
pub const DEFAULT_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Errors that can occur during SMTP operations.
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Send failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// Invalid address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled.
    #[error("Could not build message: {0}")]
    Build(String),
}

/// Tunables for one outbound transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// TCP connect timeout.
    pub connection_timeout: Duration,
    /// Wait for the server greeting.
    pub greeting_timeout: Duration,
    /// Per-command socket timeout.
    pub socket_timeout: Duration,
    /// Concurrent connections held by one transport.
    pub max_connections: u32,
    /// Messages sent over one connection before it is replaced.
    pub max_messages: usize,
    /// Messages allowed per `rate_window`.
    pub rate_limit: usize,
    /// Window for `rate_limit`.
    pub rate_window: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            greeting_timeout: Duration::from_secs(5),
            socket_timeout: Duration::from_secs(30),
            max_connections: 5,
            max_messages: 100,
            rate_limit: 10,
            rate_window: Duration::from_secs(1),
        }
    }
}

/// Attachment on an outgoing message: inline bytes or a file to read at
/// send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Bytes held in memory.
    Bytes(Vec<u8>),
    /// File read when the message is built.
    Path(PathBuf),
}

/// One attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Content.
    pub source: AttachmentSource,
    /// MIME type, [`DEFAULT_ATTACHMENT_TYPE`] when unset.
    pub content_type: Option<String>,
    /// Content id; makes the part inline.
    pub cid: Option<String>,
}

impl OutgoingAttachment {
    /// Attachment from in-memory bytes.
    #[must_use]
    pub fn bytes(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            source: AttachmentSource::Bytes(content),
            content_type: None,
            cid: None,
        }
    }

    /// Attachment read from disk at send time. The file name is taken from
    /// the path.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            filename,
            source: AttachmentSource::Path(path),
            content_type: None,
            cid: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    async fn into_part(self) -> Result<SinglePart, SmtpError> {
        let content = match self.source {
            AttachmentSource::Bytes(bytes) => bytes,
            AttachmentSource::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| SmtpError::Build(format!("{}: {e}", path.display())))?,
        };
        let content_type = self.content_type.as_deref().unwrap_or(DEFAULT_ATTACHMENT_TYPE);
        let content_type = ContentType::parse(content_type)
            .map_err(|e| SmtpError::Build(format!("content type {content_type}: {e}")))?;

        let attachment = match self.cid {
            Some(cid) => Attachment::new_inline(cid),
            None => Attachment::new(self.filename),
        };
        Ok(attachment.body(content, content_type))
    }
}

/// An email message to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Comma-separated recipient list.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Attachments.
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMessage {
    /// Creates a plain-text message.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Parsed recipients. Empty entries between commas are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SmtpError::InvalidAddress`] for an unparseable address or an
    /// empty list.
    pub fn recipients(&self) -> Result<Vec<Mailbox>, SmtpError> {
        let recipients = self
            .to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| SmtpError::InvalidAddress(format!("{addr}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(SmtpError::InvalidAddress("No recipients specified".into()));
        }
        Ok(recipients)
    }

    /// Build the RFC 5322 message sent as `Display Name <email>`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid addresses, unreadable attachment files
    /// or unknown content types.
    pub async fn into_message(self, from: &Account) -> Result<Message, SmtpError> {
        let sender = from
            .from_header()
            .parse::<Mailbox>()
            .map_err(|e| SmtpError::InvalidAddress(format!("{}: {e}", from.email)))?;

        let mut builder = Message::builder().from(sender).subject(self.subject.clone());
        for recipient in self.recipients()? {
            builder = builder.to(recipient);
        }

        let body = match (self.text, self.html) {
            (Some(text), Some(html)) => Body::Multi(MultiPart::alternative_plain_html(text, html)),
            (None, Some(html)) => Body::Single(SinglePart::html(html)),
            (text, None) => Body::Single(SinglePart::plain(text.unwrap_or_default())),
        };

        let message = if self.attachments.is_empty() {
            match body {
                Body::Single(part) => builder.singlepart(part),
                Body::Multi(part) => builder.multipart(part),
            }
        } else {
            let mut mixed = match body {
                Body::Single(part) => MultiPart::mixed().singlepart(part),
                Body::Multi(part) => MultiPart::mixed().multipart(part),
            };
            for attachment in self.attachments {
                mixed = mixed.singlepart(attachment.into_part().await?);
            }
            builder.multipart(mixed)
        };
        message.map_err(|e| SmtpError::Build(e.to_string()))
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

/// A live outbound session as the pool sees it.
pub trait Transport: Send + Sync + 'static {
    /// Check that the server still answers.
    fn verify(&self) -> impl Future<Output = Result<(), SmtpError>> + Send;

    /// Submit one message. Returns the server's reply text.
    fn send(&self, message: Message) -> impl Future<Output = Result<String, SmtpError>> + Send;

    /// Close all underlying connections. Never fails.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Creates transports for the pool.
pub trait TransportFactory: Send + Sync + 'static {
    /// Transport type produced.
    type Transport: Transport;

    /// Build a transport; does not connect yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the server settings cannot be used.
    fn create(
        &self,
        server: &ServerConfig,
        options: &TransportOptions,
    ) -> Result<Self::Transport, SmtpError>;
}

/// Serial sliding-window limiter: at most `limit` permits per `window`.
///
/// Waiters queue on the inner lock, so permits are handed out in order.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `limit` permits per `window` (at least one).
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a permit is available and take it.
    pub async fn acquire(&self) {
        let mut sent = self.sent.lock().await;
        loop {
            let now = Instant::now();
            while sent.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
                sent.pop_front();
            }
            if sent.len() < self.limit {
                sent.push_back(now);
                return;
            }
            if let Some(oldest) = sent.front().copied() {
                let until = oldest + self.window;
                debug!(
                    wait_ms = until.duration_since(now).as_millis(),
                    "Rate limit reached, waiting"
                );
                tokio::time::sleep_until(until).await;
            }
        }
    }
}

type Smtp = AsyncSmtpTransport<Tokio1Executor>;

#[derive(Debug)]
struct Connection {
    smtp: Smtp,
    sent: usize,
}

/// [`Transport`] backed by `lettre`.
///
/// Implicit TLS when the server config is `secure`, opportunistic STARTTLS
/// otherwise. Sends go through the rate limiter, and the underlying
/// connections are replaced after `max_messages` sends.
pub struct LettreTransport {
    server: ServerConfig,
    options: TransportOptions,
    limiter: RateLimiter,
    connection: Mutex<Connection>,
}

impl std::fmt::Debug for LettreTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LettreTransport")
            .field("host", &self.server.host)
            .field("port", &self.server.port)
            .field("user", &self.server.user)
            .finish_non_exhaustive()
    }
}

impl LettreTransport {
    /// Build a transport for `server`.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS parameters cannot be built for the host.
    pub fn new(server: &ServerConfig, options: &TransportOptions) -> Result<Self, SmtpError> {
        Ok(Self {
            server: server.clone(),
            options: *options,
            limiter: RateLimiter::new(options.rate_limit, options.rate_window),
            connection: Mutex::new(Connection {
                smtp: build_smtp(server, options)?,
                sent: 0,
            }),
        })
    }

    fn handshake_timeout(&self) -> Duration {
        self.options.connection_timeout + self.options.greeting_timeout
    }
}

fn build_smtp(server: &ServerConfig, options: &TransportOptions) -> Result<Smtp, SmtpError> {
    let tls_parameters =
        TlsParameters::new(server.host.clone()).map_err(|e| SmtpError::Connection(e.to_string()))?;
    let tls = if server.secure {
        Tls::Wrapper(tls_parameters)
    } else {
        Tls::Opportunistic(tls_parameters)
    };

    Ok(Smtp::builder_dangerous(&server.host)
        .port(server.port)
        .tls(tls)
        .credentials(Credentials::new(server.user.clone(), server.password.clone()))
        .timeout(Some(options.socket_timeout))
        .pool_config(LettrePoolConfig::new().max_size(options.max_connections))
        .build())
}

fn classify(e: &smtp::Error) -> SmtpError {
    let code = e.status().map(|c| c.to_string());
    if code.as_deref().is_some_and(|c| c.starts_with("53")) {
        SmtpError::Authentication(e.to_string())
    } else if e.is_permanent() || e.is_transient() {
        SmtpError::Send(e.to_string())
    } else {
        SmtpError::Connection(e.to_string())
    }
}

impl Transport for LettreTransport {
    async fn verify(&self) -> Result<(), SmtpError> {
        let smtp = self.connection.lock().await.smtp.clone();
        match tokio::time::timeout(self.handshake_timeout(), smtp.test_connection()).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(SmtpError::Connection("server rejected test connection".into())),
            Ok(Err(e)) => Err(classify(&e)),
            Err(_) => Err(SmtpError::Connection(format!(
                "timed out after {}s",
                self.handshake_timeout().as_secs()
            ))),
        }
    }

    async fn send(&self, message: Message) -> Result<String, SmtpError> {
        self.limiter.acquire().await;

        let mut connection = self.connection.lock().await;
        let response = connection.smtp.send(message).await.map_err(|e| classify(&e))?;
        connection.sent += 1;

        if connection.sent >= self.options.max_messages {
            debug!(host = %self.server.host, sent = connection.sent, "Recycling SMTP connections");
            let fresh = build_smtp(&self.server, &self.options)?;
            let old = std::mem::replace(&mut connection.smtp, fresh);
            connection.sent = 0;
            old.shutdown().await;
        }

        Ok(response.message().collect::<Vec<_>>().join(" "))
    }

    async fn close(&self) {
        self.connection.lock().await.smtp.shutdown().await;
        debug!(host = %self.server.host, "Closed SMTP transport");
    }
}

/// Builds [`LettreTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreFactory;

impl TransportFactory for LettreFactory {
    type Transport = LettreTransport;

    fn create(
        &self,
        server: &ServerConfig,
        options: &TransportOptions,
    ) -> Result<LettreTransport, SmtpError> {
        if server.host.trim().is_empty() {
            return Err(SmtpError::Connection("SMTP host is not configured".into()));
        }
        info!(
            host = %server.host,
            port = server.port,
            secure = server.secure,
            "Creating SMTP transport"
        );
        LettreTransport::new(server, options)
    }
}
