//! Kaizen Mail - keyboard-driven terminal email client
//!
//! Built with Rust, ratatui, async-imap and lettre.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod app;
mod message;
mod model;
mod style;
mod view;
mod worker;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use kaizen_mail_core::service::Uid;
use kaizen_mail_core::storage::{config_dir, ensure_dir};
use kaizen_mail_core::{Account, ConnectionPool, ImapConnector, LettreFactory, MailboxSession};

use app::{Action, App};
use message::{Command, Message, WorkerEvent};
use worker::Worker;

const LOG_FILE: &str = "kaizen-mail.log";

/// How long to wait for the worker to log out on quit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dir = config_dir()?;
    ensure_dir(&dir)?;
    init_logging(&dir)?;

    info!("Starting Kaizen Mail");

    let terminal = ratatui::init();
    let result = run(terminal, dir).await;
    ratatui::restore();
    result
}

/// Log to a file in the config directory; the terminal belongs to the UI.
fn init_logging(dir: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kaizen_mail=info,kaizen_mail_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

/// Background services that exist once the vault is unlocked.
struct Services {
    commands: UnboundedSender<Command>,
    worker: JoinHandle<()>,
    pool: Arc<ConnectionPool<LettreFactory>>,
}

impl Services {
    fn start(account: &Account, events: &UnboundedSender<Message>) -> Self {
        let session = MailboxSession::new(ImapConnector::default(), account.imap.clone());
        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Worker::new(session, events.clone()).run(receiver));
        let pool = Arc::new(ConnectionPool::with_defaults(LettreFactory));

        let check = Arc::clone(&pool);
        let account = account.clone();
        let events = events.clone();
        tokio::spawn(async move {
            let ok = check.verify_smtp(&account).await;
            let _ = events.send(Message::SmtpChecked(ok));
        });

        Self { commands, worker, pool }
    }

    /// Stop the worker (which logs out) and close pooled SMTP connections.
    async fn shutdown(self) {
        drop(self.commands);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Mail worker ended abnormally: {e}"),
            Err(_) => warn!("Mail worker did not stop in time"),
        }
        self.pool.shutdown().await;
        info!("Services stopped");
    }
}

/// Forward terminal events on a plain thread; it blocks in `read`.
fn spawn_input(events: UnboundedSender<Message>) {
    std::thread::spawn(move || {
        loop {
            let message = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Message::Key(key),
                Ok(Event::Resize(..)) => Message::Resize,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Terminal input failed: {e}");
                    break;
                }
            };
            if events.send(message).is_err() {
                break;
            }
        }
    });
}

async fn run(mut terminal: DefaultTerminal, dir: PathBuf) -> anyhow::Result<()> {
    let (events, mut inbox) = mpsc::unbounded_channel();
    spawn_input(events.clone());

    let mut app = App::new(dir);
    let mut services = None;
    let mut quit = perform(app.auto_unlock(), &events, &mut services);

    while !quit {
        terminal.draw(|frame| view::render(frame, &app))?;
        let Some(message) = inbox.recv().await else {
            break;
        };
        let action = app.update(message);
        quit = perform(action, &events, &mut services);
    }

    if let Some(services) = services {
        services.shutdown().await;
    }
    info!("Kaizen Mail exited");
    Ok(())
}

/// Carry out an [`Action`]. Returns `true` when the app should quit.
fn perform(
    action: Action,
    events: &UnboundedSender<Message>,
    services: &mut Option<Services>,
) -> bool {
    match action {
        Action::None => {}
        Action::Quit => return true,
        Action::Batch(actions) => {
            for action in actions {
                if perform(action, events, services) {
                    return true;
                }
            }
        }
        Action::Start(account) => {
            *services = Some(Services::start(&account, events));
        }
        Action::Worker(command) => {
            if let Some(services) = services
                && services.commands.send(command).is_err()
            {
                warn!("Mail worker is gone");
            }
        }
        Action::Send(account, outgoing) => {
            if let Some(services) = services {
                let pool = Arc::clone(&services.pool);
                let events = events.clone();
                tokio::spawn(async move {
                    let result =
                        pool.send_mail(&account, outgoing).await.map_err(|e| e.to_string());
                    let _ = events.send(Message::Sent(result));
                });
            }
        }
        Action::OpenHtml { uid, html } => {
            if let Err(e) = open_html(uid, &html) {
                warn!(uid, "Could not open HTML: {e:#}");
                let failed = WorkerEvent::Failed(format!("Could not open HTML: {e}"));
                let _ = events.send(Message::Worker(failed));
            }
        }
    }
    false
}

fn open_html(uid: Uid, html: &str) -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("kaizen-mail-{uid}.html"));
    std::fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    opener::open(&path)?;
    Ok(())
}
