//! Keyed cache of live SMTP transports.
//!
//! Transports are keyed by `(host, port, user)`. A cached transport is
//! verified before every reuse and replaced when dead. A background task owned
//! by the pool closes entries that sat idle past [`PoolConfig::idle_timeout`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::smtp::{OutgoingMessage, SmtpError, Transport, TransportFactory, TransportOptions};
use crate::account::{Account, ServerConfig};

/// Eviction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Entries unused for longer than this are closed.
    pub idle_timeout: Duration,
    /// How often the eviction scan runs.
    pub eviction_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5 * 60),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    host: String,
    port: u16,
    user: String,
}

impl From<&ServerConfig> for PoolKey {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            user: server.user.clone(),
        }
    }
}

#[derive(Debug)]
struct PooledConnection<T> {
    transport: Arc<T>,
    last_used: Instant,
}

type Entries<T> = Arc<Mutex<HashMap<PoolKey, PooledConnection<T>>>>;

/// SMTP connection pool.
///
/// Construct one per application and share it by reference. Creating a pool
/// spawns its eviction task, so it must happen inside a Tokio runtime.
pub struct ConnectionPool<F: TransportFactory> {
    factory: F,
    options: TransportOptions,
    entries: Entries<F::Transport>,
    shutdown_tx: watch::Sender<bool>,
    eviction: Mutex<Option<JoinHandle<()>>>,
}

impl<F: TransportFactory + std::fmt::Debug> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("factory", &self.factory)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<F: TransportFactory> ConnectionPool<F> {
    /// Create a pool and start its eviction task.
    #[must_use]
    pub fn new(factory: F, options: TransportOptions, config: PoolConfig) -> Self {
        let entries: Entries<F::Transport> = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(eviction_loop(Arc::clone(&entries), config, shutdown_rx));

        Self {
            factory,
            options,
            entries,
            shutdown_tx,
            eviction: Mutex::new(Some(task)),
        }
    }

    /// Pool with default transport options and eviction settings.
    #[must_use]
    pub fn with_defaults(factory: F) -> Self {
        Self::new(factory, TransportOptions::default(), PoolConfig::default())
    }

    /// Number of cached transports.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no transport is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Get a verified transport for the account, reusing a cached one when
    /// it still answers.
    ///
    /// # Errors
    ///
    /// Returns an error if a new transport cannot be created or fails its
    /// first verification. Not retried here.
    pub async fn acquire(&self, account: &Account) -> Result<Arc<F::Transport>, SmtpError> {
        let key = PoolKey::from(&account.smtp);

        let cached = self
            .entries
            .lock()
            .await
            .get(&key)
            .map(|entry| Arc::clone(&entry.transport));

        if let Some(transport) = cached {
            match transport.verify().await {
                Ok(()) => {
                    self.touch(&key, &transport).await;
                    debug!(host = %key.host, "Reusing pooled SMTP transport");
                    return Ok(transport);
                }
                Err(e) => {
                    warn!(host = %key.host, "Pooled SMTP transport is dead, replacing: {e}");
                    self.remove_if_same(&key, &transport).await;
                    transport.close().await;
                }
            }
        }

        let transport = Arc::new(self.factory.create(&account.smtp, &self.options)?);
        if let Err(e) = transport.verify().await {
            transport.close().await;
            return Err(match e {
                SmtpError::Authentication(_) | SmtpError::Connection(_) => e,
                other => SmtpError::Connection(other.to_string()),
            });
        }

        let cached = match self.entries.lock().await.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_used = Instant::now();
                Some(Arc::clone(&entry.get().transport))
            }
            Entry::Vacant(slot) => {
                slot.insert(PooledConnection {
                    transport: Arc::clone(&transport),
                    last_used: Instant::now(),
                });
                None
            }
        };
        if let Some(cached) = cached {
            debug!(host = %key.host, "Concurrent acquire won, closing duplicate transport");
            transport.close().await;
            return Ok(cached);
        }
        info!(host = %key.host, port = key.port, "Opened pooled SMTP transport");
        Ok(transport)
    }

    /// Send through a pooled transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built, no transport can be
    /// acquired, or the server rejects the message.
    pub async fn send_mail(
        &self,
        account: &Account,
        message: OutgoingMessage,
    ) -> Result<String, SmtpError> {
        let message = message.into_message(account).await?;
        let transport = self.acquire(account).await?;
        let response = transport.send(message).await?;
        self.touch(&PoolKey::from(&account.smtp), &transport).await;
        info!(host = %account.smtp.host, "Message sent");
        Ok(response)
    }

    /// Send over a transport created for this message alone. The transport
    /// is closed whether or not the send succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or sent.
    pub async fn send_once(
        &self,
        account: &Account,
        message: OutgoingMessage,
    ) -> Result<String, SmtpError> {
        let message = message.into_message(account).await?;
        let transport = self.factory.create(&account.smtp, &self.options)?;
        let result = transport.send(message).await;
        transport.close().await;
        result
    }

    /// Check the account's SMTP settings with a throwaway transport.
    pub async fn verify_smtp(&self, account: &Account) -> bool {
        let transport = match self.factory.create(&account.smtp, &self.options) {
            Ok(transport) => transport,
            Err(e) => {
                warn!(host = %account.smtp.host, "SMTP verification failed: {e}");
                return false;
            }
        };
        let result = transport.verify().await;
        transport.close().await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(host = %account.smtp.host, "SMTP verification failed: {e}");
                false
            }
        }
    }

    /// Close and forget the account's transport.
    pub async fn release(&self, account: &Account) {
        let removed = self.entries.lock().await.remove(&PoolKey::from(&account.smtp));
        if let Some(entry) = removed {
            entry.transport.close().await;
            debug!(host = %account.smtp.host, "Released SMTP transport");
        }
    }

    /// Close and forget every transport.
    pub async fn release_all(&self) {
        let drained: Vec<_> = self.entries.lock().await.drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.transport.close().await;
        }
    }

    /// Stop the eviction task and close every transport.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.eviction.lock().await.take()
            && let Err(e) = task.await
        {
            warn!("SMTP eviction task join failed during shutdown: {e}");
        }
        self.release_all().await;
        info!("SMTP pool shut down");
    }

    /// Evict idle entries now instead of waiting for the next scan.
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        evict_idle(&self.entries, idle_timeout).await
    }

    async fn touch(&self, key: &PoolKey, transport: &Arc<F::Transport>) {
        if let Some(entry) = self.entries.lock().await.get_mut(key)
            && Arc::ptr_eq(&entry.transport, transport)
        {
            entry.last_used = Instant::now();
        }
    }

    async fn remove_if_same(&self, key: &PoolKey, transport: &Arc<F::Transport>) {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| Arc::ptr_eq(&entry.transport, transport)) {
            entries.remove(key);
        }
    }
}

impl<F: TransportFactory> Drop for ConnectionPool<F> {
    fn drop(&mut self) {
        if let Some(task) = self.eviction.get_mut().take() {
            task.abort();
        }
    }
}

async fn eviction_loop<T: Transport>(
    entries: Entries<T>,
    config: PoolConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = config.eviction_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                evict_idle(&entries, config.idle_timeout).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("SMTP eviction task stopping");
                    break;
                }
            }
        }
    }
}

async fn evict_idle<T: Transport>(entries: &Entries<T>, idle_timeout: Duration) -> usize {
    let expired: Vec<_> = {
        let mut entries = entries.lock().await;
        let now = Instant::now();
        let keys: Vec<_> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_used) > idle_timeout)
            .map(|(key, _)| key.clone())
            .collect();
        keys.into_iter().filter_map(|key| entries.remove(&key)).collect()
    };

    for entry in &expired {
        entry.transport.close().await;
    }
    if !expired.is_empty() {
        info!(count = expired.len(), "Evicted idle SMTP transports");
    }
    expired.len()
}
