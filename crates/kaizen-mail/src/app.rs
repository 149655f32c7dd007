//! Application state and the update function.
//!
//! [`App::update`] is the only place state changes. It never touches the
//! network: anything slow comes back out as an [`Action`] for the runtime in
//! `main.rs`, and the result re-enters as another [`Message`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use kaizen_mail_core::service::{MailboxInfo, Uid};
use kaizen_mail_core::{
    Account, ComposeForm, Config, ConfigStore, ConnectionStatus, Draft, DraftStore, Error,
    OutgoingMessage, Signature, SignatureFormat, StoreError, compose, credentials,
    validate_account,
};

use crate::message::{Command, ListingSnapshot, Message, WorkerEvent};
use crate::model::{
    ComposeField, ComposeState, OnboardingState, ReaderState, SearchField, SearchForm, TextInput,
};
use crate::model::onboarding::Field;

/// Mailbox opened when none was remembered.
const DEFAULT_MAILBOX: &str = "INBOX";

/// Lines moved by `PageUp`/`PageDown` in the reader.
const SCROLL_PAGE: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Unlock,
    Onboarding,
    Mailboxes,
    Messages,
    Reader,
    Compose,
    Drafts,
    Manager,
    Help,
}

/// Side effects requested by [`App::update`].
#[derive(Debug)]
pub enum Action {
    None,
    /// Spawn the mail worker and SMTP pool for this account.
    Start(Account),
    Worker(Command),
    Send(Account, OutgoingMessage),
    /// Show an HTML body in the system browser.
    OpenHtml { uid: Uid, html: String },
    Quit,
    Batch(Vec<Self>),
}

/// Single-line prompt shown over the current screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    Move(Vec<Uid>),
    Attach,
    CreateMailbox,
    RenameMailbox(String),
    DeleteMailbox(String),
    Signature,
}

impl PromptKind {
    pub fn title(&self) -> String {
        match self {
            Self::Move(uids) => format!("Move {} message(s) to", uids.len()),
            Self::Attach => "Attach file (path)".to_string(),
            Self::CreateMailbox => "New mailbox".to_string(),
            Self::RenameMailbox(from) => format!("Rename {from} to"),
            Self::DeleteMailbox(path) => format!("Delete {path}? Type y to confirm"),
            Self::Signature => "Signature (empty disables)".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: TextInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub error: bool,
}

/// Everything the UI shows.
#[derive(Debug)]
pub struct App {
    dir: PathBuf,
    pub screen: Screen,
    /// Screen to return to from help, compose and drafts.
    back: Screen,
    pub unlock: TextInput,
    pub onboarding: OnboardingState,
    store: Option<ConfigStore>,
    drafts: Option<DraftStore>,
    pub config: Option<Config>,
    pub status: ConnectionStatus,
    pub mailboxes: Vec<MailboxInfo>,
    pub mailbox_cursor: usize,
    pub listing: ListingSnapshot,
    pub list_cursor: usize,
    pub selected: BTreeSet<Uid>,
    pub reader: Option<ReaderState>,
    pub compose: Option<ComposeState>,
    pub draft_list: Vec<Draft>,
    pub draft_cursor: usize,
    pub prompt: Option<Prompt>,
    pub search: Option<SearchForm>,
    pub notice: Option<Notice>,
    pub loading: bool,
}

fn is_ctrl(key: KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

const fn step(cursor: usize, len: usize, down: bool) -> usize {
    if len == 0 {
        0
    } else if down {
        if cursor + 1 < len { cursor + 1 } else { cursor }
    } else {
        cursor.saturating_sub(1)
    }
}

fn open_vault(
    dir: &Path,
    passphrase: &str,
) -> kaizen_mail_core::Result<(ConfigStore, Option<Config>)> {
    let store = ConfigStore::open(dir, passphrase)?;
    let config = store.load()?;
    Ok((store, config))
}

fn create_vault(
    dir: &Path,
    passphrase: &str,
    config: &Config,
) -> kaizen_mail_core::Result<ConfigStore> {
    validate_account(&config.account)?;
    let store = ConfigStore::open(dir, passphrase)?;
    store.save(config)?;
    Ok(store)
}

impl App {
    pub fn new(dir: PathBuf) -> Self {
        let screen = if ConfigStore::exists_in(&dir) {
            Screen::Unlock
        } else {
            Screen::Onboarding
        };
        Self {
            dir,
            screen,
            back: Screen::Messages,
            unlock: TextInput::default(),
            onboarding: OnboardingState::default(),
            store: None,
            drafts: None,
            config: None,
            status: ConnectionStatus::Disconnected,
            mailboxes: Vec::new(),
            mailbox_cursor: 0,
            listing: ListingSnapshot::default(),
            list_cursor: 0,
            selected: BTreeSet::new(),
            reader: None,
            compose: None,
            draft_list: Vec::new(),
            draft_cursor: 0,
            prompt: None,
            search: None,
            notice: None,
            loading: false,
        }
    }

    fn profile(&self) -> String {
        self.dir.display().to_string()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            error: false,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            error: true,
        });
    }

    /// Unlock with a passphrase remembered in the keyring, if any.
    pub fn auto_unlock(&mut self) -> Action {
        if self.screen != Screen::Unlock {
            return Action::None;
        }
        match credentials::get_passphrase(&self.profile()) {
            Ok(Some(passphrase)) => {
                info!("Unlocking with keyring passphrase");
                self.unlock_with(&passphrase)
            }
            Ok(None) => Action::None,
            Err(e) => {
                warn!("Keyring unavailable: {e}");
                Action::None
            }
        }
    }

    fn unlock_with(&mut self, passphrase: &str) -> Action {
        match open_vault(&self.dir, passphrase) {
            Ok((store, Some(config))) => {
                self.store = Some(store);
                self.finish_unlock(config, passphrase)
            }
            Ok((_, None)) => {
                self.screen = Screen::Onboarding;
                Action::None
            }
            Err(Error::Store(StoreError::Decrypt(_))) => {
                self.unlock.set("");
                self.error("Wrong passphrase");
                Action::None
            }
            Err(e) => {
                self.error(e.to_string());
                Action::None
            }
        }
    }

    fn finish_unlock(&mut self, config: Config, passphrase: &str) -> Action {
        match DraftStore::open(&self.dir, passphrase) {
            Ok(drafts) => self.drafts = Some(drafts),
            Err(e) => self.error(format!("Drafts unavailable: {e}")),
        }
        let mailbox = config
            .last_selected_mailbox
            .clone()
            .unwrap_or_else(|| DEFAULT_MAILBOX.to_string());
        let account = config.account.clone();
        self.config = Some(config);
        self.screen = Screen::Messages;
        self.loading = true;
        info!(email = %account.email, "Vault unlocked");
        Action::Batch(vec![
            Action::Start(account),
            Action::Worker(Command::Connect),
            Action::Worker(Command::OpenMailbox(mailbox)),
        ])
    }

    /// Handle one message.
    pub fn update(&mut self, message: Message) -> Action {
        match message {
            Message::Key(key) => {
                self.notice = None;
                self.on_key(key)
            }
            Message::Resize => Action::None,
            Message::Worker(event) => {
                self.on_worker(event);
                Action::None
            }
            Message::Sent(result) => {
                self.on_sent(result);
                Action::None
            }
            Message::SmtpChecked(ok) => {
                if !ok {
                    self.error("SMTP login failed; check the account settings");
                }
                Action::None
            }
        }
    }

    fn on_worker(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Status(status) => self.status = status,
            WorkerEvent::Mailboxes(mailboxes) => {
                self.mailboxes = mailboxes;
                self.mailbox_cursor =
                    self.mailbox_cursor.min(self.mailboxes.len().saturating_sub(1));
            }
            WorkerEvent::Listing(listing) => {
                if listing.mailbox != self.listing.mailbox
                    || listing.filter != self.listing.filter
                {
                    self.selected.clear();
                    self.list_cursor = 0;
                }
                self.list_cursor = self.list_cursor.min(listing.messages.len().saturating_sub(1));
                if let Some(i) = self.mailboxes.iter().position(|m| m.path == listing.mailbox) {
                    self.mailbox_cursor = i;
                }
                self.listing = listing;
                self.loading = false;
            }
            WorkerEvent::Opened(message) => {
                self.reader = Some(ReaderState::new(*message));
                self.loading = false;
            }
            WorkerEvent::Notice(text) => self.info(text),
            WorkerEvent::Failed(text) => {
                self.loading = false;
                self.error(text);
            }
        }
    }

    fn on_sent(&mut self, result: Result<String, String>) {
        match result {
            Ok(response) => {
                info!(%response, "Message sent");
                let draft = self.compose.take().and_then(|c| c.draft_id);
                if let (Some(id), Some(drafts)) = (draft, &self.drafts)
                    && let Err(e) = drafts.delete(&id)
                {
                    warn!("Could not remove sent draft: {e}");
                }
                self.screen = self.back;
                self.info("Message sent");
            }
            Err(e) => {
                if let Some(compose) = &mut self.compose {
                    compose.sending = false;
                }
                self.error(format!("Send failed: {e}"));
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Action {
        if is_ctrl(key, 'c') {
            return Action::Quit;
        }
        if self.prompt.is_some() {
            return self.on_prompt_key(key);
        }
        if self.search.is_some() {
            return self.on_search_key(key);
        }
        match self.screen {
            Screen::Unlock => self.on_unlock_key(key),
            Screen::Onboarding => self.on_onboarding_key(key),
            Screen::Compose => self.on_compose_key(key),
            Screen::Help => {
                self.screen = self.back;
                Action::None
            }
            _ => self.on_browse_key(key),
        }
    }

    fn on_unlock_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Enter if !self.unlock.is_empty() => {
                let passphrase = self.unlock.value().to_string();
                self.unlock_with(&passphrase)
            }
            _ => {
                self.unlock.handle_key(key);
                Action::None
            }
        }
    }

    fn on_onboarding_key(&mut self, key: KeyEvent) -> Action {
        let form = &mut self.onboarding;
        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left if form.focus == Field::Provider => form.cycle_provider(false),
            KeyCode::Right if form.focus == Field::Provider => form.cycle_provider(true),
            KeyCode::Char(' ') if form.focus == Field::Remember => form.remember = !form.remember,
            KeyCode::Enter => return self.submit_onboarding(),
            _ => {
                let focus = form.focus;
                if let Some(input) = form.input_mut(focus) {
                    input.handle_key(key);
                }
            }
        }
        Action::None
    }

    fn submit_onboarding(&mut self) -> Action {
        let Some(done) = self.onboarding.submit() else {
            return Action::None;
        };
        let config = Config::new(done.account);
        match create_vault(&self.dir, &done.passphrase, &config) {
            Ok(store) => {
                self.store = Some(store);
                if done.remember
                    && let Err(e) = credentials::store_passphrase(&self.profile(), &done.passphrase)
                {
                    warn!("Could not store passphrase in keyring: {e}");
                }
                self.finish_unlock(config, &done.passphrase)
            }
            Err(e) => {
                self.onboarding.errors = vec![e.to_string()];
                Action::None
            }
        }
    }

    fn on_prompt_key(&mut self, key: KeyEvent) -> Action {
        let Some(prompt) = &mut self.prompt else {
            return Action::None;
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
                Action::None
            }
            KeyCode::Enter => {
                let value = prompt.input.value().trim().to_string();
                let kind = prompt.kind.clone();
                self.prompt = None;
                self.confirm_prompt(kind, value)
            }
            _ => {
                prompt.input.handle_key(key);
                Action::None
            }
        }
    }

    fn confirm_prompt(&mut self, kind: PromptKind, value: String) -> Action {
        match kind {
            PromptKind::Signature => {
                self.save_signature(&value);
                return Action::None;
            }
            PromptKind::DeleteMailbox(path) => {
                return if value.eq_ignore_ascii_case("y") {
                    Action::Worker(Command::DeleteMailbox(path))
                } else {
                    Action::None
                };
            }
            _ => {}
        }
        if value.is_empty() {
            return Action::None;
        }
        match kind {
            PromptKind::Move(uids) => {
                self.selected.clear();
                Action::Worker(Command::Move(uids, value))
            }
            PromptKind::Attach => {
                if let Some(compose) = &mut self.compose {
                    compose.attach(&value);
                }
                Action::None
            }
            PromptKind::CreateMailbox => Action::Worker(Command::CreateMailbox(value)),
            PromptKind::RenameMailbox(from) => {
                Action::Worker(Command::RenameMailbox { from, to: value })
            }
            PromptKind::DeleteMailbox(_) | PromptKind::Signature => Action::None,
        }
    }

    fn save_signature(&mut self, content: &str) {
        let signature = Signature {
            enabled: !content.is_empty(),
            format: SignatureFormat::Text,
            content: content.to_string(),
        };
        let Some(store) = &self.store else {
            return;
        };
        match store.set_signature(signature.clone()) {
            Ok(()) => {
                if let Some(config) = &mut self.config {
                    config.signature = Some(signature);
                }
                self.info("Signature saved");
            }
            Err(e) => self.error(format!("Could not save signature: {e}")),
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) -> Action {
        let Some(form) = &mut self.search else {
            return Action::None;
        };
        match key.code {
            KeyCode::Esc => self.search = None,
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Char(' ')
                if matches!(form.focus, SearchField::Unseen | SearchField::Flagged) =>
            {
                form.toggle();
            }
            KeyCode::Enter => match form.criteria() {
                Ok(criteria) => {
                    self.search = None;
                    self.loading = true;
                    return Action::Worker(Command::Search(criteria));
                }
                Err(e) => form.error = Some(e),
            },
            _ => {
                let focus = form.focus;
                if let Some(input) = form.input_mut(focus) {
                    input.handle_key(key);
                }
            }
        }
        Action::None
    }

    fn on_compose_key(&mut self, key: KeyEvent) -> Action {
        let Some(compose) = &mut self.compose else {
            self.screen = self.back;
            return Action::None;
        };
        if compose.sending {
            return Action::None;
        }
        if is_ctrl(key, 'x') {
            return self.send();
        }
        if is_ctrl(key, 's') {
            self.save_draft();
            return Action::None;
        }
        if is_ctrl(key, 'g') {
            compose.include_signature = !compose.include_signature;
            return Action::None;
        }
        if is_ctrl(key, 'r') {
            if let Some(removed) = compose.attachments.pop() {
                let name = removed.filename.unwrap_or_default();
                self.info(format!("Removed {name}"));
            }
            return Action::None;
        }
        if is_ctrl(key, 'a') {
            self.prompt = Some(Prompt {
                kind: PromptKind::Attach,
                input: TextInput::default(),
            });
            return Action::None;
        }
        match key.code {
            KeyCode::Esc => {
                if !compose.form().is_blank() {
                    self.save_draft();
                }
                self.compose = None;
                self.screen = self.back;
            }
            KeyCode::Tab => compose.next_field(),
            KeyCode::BackTab => compose.prev_field(),
            KeyCode::Enter if compose.focus == ComposeField::Body => compose.body.insert('\n'),
            KeyCode::Enter => compose.next_field(),
            _ => {
                compose.focused().handle_key(key);
            }
        }
        Action::None
    }

    fn send(&mut self) -> Action {
        let (Some(compose), Some(config)) = (&mut self.compose, &self.config) else {
            return Action::None;
        };
        if compose.to.value().trim().is_empty() {
            self.error("Add at least one recipient");
            return Action::None;
        }
        compose.sending = true;
        let outgoing = compose.outgoing(config.signature.as_ref());
        let account = config.account.clone();
        self.info("Sending...");
        Action::Send(account, outgoing)
    }

    fn save_draft(&mut self) {
        let (Some(compose), Some(drafts)) = (&mut self.compose, &self.drafts) else {
            return;
        };
        match drafts.save(compose.form().to_draft_input()) {
            Ok(draft) => {
                compose.draft_id = Some(draft.id);
                self.info("Draft saved");
            }
            Err(e) => self.error(format!("Could not save draft: {e}")),
        }
    }

    fn open_compose(&mut self, form: ComposeForm) {
        let include_signature = self
            .config
            .as_ref()
            .and_then(|c| c.signature.as_ref())
            .is_some_and(|s| s.enabled);
        if self.screen != Screen::Compose {
            self.back = self.screen;
        }
        self.compose = Some(ComposeState::new(form, include_signature));
        self.screen = Screen::Compose;
    }

    fn open_drafts(&mut self) {
        let Some(drafts) = &self.drafts else {
            self.error("Drafts are unavailable");
            return;
        };
        match drafts.list() {
            Ok(list) => {
                self.draft_list = list;
                self.draft_cursor = 0;
                self.back = self.screen;
                self.screen = Screen::Drafts;
            }
            Err(e) => self.error(format!("Could not read drafts: {e}")),
        }
    }

    /// Selected messages, or the one under the cursor.
    fn targets(&self) -> Vec<Uid> {
        if self.selected.is_empty() {
            self.current_uid().into_iter().collect()
        } else {
            self.selected.iter().copied().collect()
        }
    }

    pub fn current_uid(&self) -> Option<Uid> {
        self.listing.messages.get(self.list_cursor).map(|m| m.uid)
    }

    fn target_flags(&self, uids: &[Uid]) -> (bool, bool) {
        let on_page = self.listing.messages.iter().filter(|m| uids.contains(&m.uid));
        on_page.fold((true, true), |(seen, flagged), m| (seen && m.seen, flagged && m.flagged))
    }

    fn mutate(&mut self, command: Command) -> Action {
        self.selected.clear();
        self.loading = true;
        Action::Worker(command)
    }

    fn on_browse_key(&mut self, key: KeyEvent) -> Action {
        if is_ctrl(key, 'r') {
            self.loading = true;
            return Action::Worker(Command::Reconnect);
        }
        match key.code {
            KeyCode::Char('q') if self.screen != Screen::Reader => return Action::Quit,
            KeyCode::Char('?') => {
                self.back = self.screen;
                self.screen = Screen::Help;
                return Action::None;
            }
            KeyCode::Char('c') if self.screen != Screen::Drafts => {
                self.open_compose(ComposeForm::default());
                return Action::None;
            }
            KeyCode::Char('d') if matches!(self.screen, Screen::Mailboxes | Screen::Messages) => {
                self.open_drafts();
                return Action::None;
            }
            KeyCode::Char('M') if matches!(self.screen, Screen::Mailboxes | Screen::Messages) => {
                self.back = self.screen;
                self.screen = Screen::Manager;
                return Action::Worker(Command::ListMailboxes);
            }
            _ => {}
        }
        match self.screen {
            Screen::Mailboxes => self.on_mailboxes_key(key),
            Screen::Messages => self.on_messages_key(key),
            Screen::Reader => self.on_reader_key(key),
            Screen::Drafts => self.on_drafts_key(key),
            Screen::Manager => self.on_manager_key(key),
            _ => Action::None,
        }
    }

    fn on_mailboxes_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.mailbox_cursor = step(self.mailbox_cursor, self.mailboxes.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.mailbox_cursor = step(self.mailbox_cursor, self.mailboxes.len(), false);
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.screen = Screen::Messages,
            KeyCode::Char('S') => {
                let current = self
                    .config
                    .as_ref()
                    .and_then(|c| c.signature.as_ref())
                    .map(|s| s.content.clone())
                    .unwrap_or_default();
                self.prompt = Some(Prompt {
                    kind: PromptKind::Signature,
                    input: TextInput::new(current),
                });
            }
            KeyCode::Enter => {
                let Some(mailbox) = self.mailboxes.get(self.mailbox_cursor) else {
                    return Action::None;
                };
                if !mailbox.selectable {
                    let text = format!("{} cannot hold messages", mailbox.name);
                    self.error(text);
                    return Action::None;
                }
                let path = mailbox.path.clone();
                self.remember_mailbox(&path);
                self.screen = Screen::Messages;
                self.loading = true;
                return Action::Worker(Command::OpenMailbox(path));
            }
            _ => {}
        }
        Action::None
    }

    fn remember_mailbox(&mut self, path: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.set_last_selected_mailbox(path)
        {
            warn!("Could not remember mailbox: {e}");
        }
        if let Some(config) = &mut self.config {
            config.last_selected_mailbox = Some(path.to_string());
        }
    }

    fn on_messages_key(&mut self, key: KeyEvent) -> Action {
        let len = self.listing.messages.len();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.list_cursor = step(self.list_cursor, len, true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.list_cursor = step(self.list_cursor, len, false);
            }
            KeyCode::Tab | KeyCode::Left | KeyCode::Char('h') => self.screen = Screen::Mailboxes,
            KeyCode::Char('n') => {
                if self.listing.page + 1 < self.listing.total_pages {
                    self.list_cursor = 0;
                    self.loading = true;
                    return Action::Worker(Command::NextPage);
                }
            }
            KeyCode::Char('p') => {
                if self.listing.page > 0 {
                    self.list_cursor = 0;
                    self.loading = true;
                    return Action::Worker(Command::PrevPage);
                }
            }
            KeyCode::Char('r') => {
                self.loading = true;
                return Action::Worker(Command::Refresh);
            }
            KeyCode::Char('/') => {
                let form = self
                    .listing
                    .filter
                    .as_ref()
                    .map_or_else(SearchForm::default, SearchForm::from_criteria);
                self.search = Some(form);
            }
            KeyCode::Esc => {
                if !self.selected.is_empty() {
                    self.selected.clear();
                } else if self.listing.filter.is_some() {
                    self.loading = true;
                    return Action::Worker(Command::ClearFilter);
                }
            }
            KeyCode::Char('v') => {
                if let Some(uid) = self.current_uid()
                    && !self.selected.remove(&uid)
                {
                    self.selected.insert(uid);
                }
            }
            KeyCode::Char('s') => {
                let uids = self.targets();
                if !uids.is_empty() {
                    let (seen, _) = self.target_flags(&uids);
                    return self.mutate(Command::SetSeen(uids, !seen));
                }
            }
            KeyCode::Char('f') => {
                let uids = self.targets();
                if !uids.is_empty() {
                    let (_, flagged) = self.target_flags(&uids);
                    return self.mutate(Command::SetFlagged(uids, !flagged));
                }
            }
            KeyCode::Char('x') => {
                let uids = self.targets();
                if !uids.is_empty() {
                    return self.mutate(Command::Delete(uids));
                }
            }
            KeyCode::Char('m') => {
                let uids = self.targets();
                if !uids.is_empty() {
                    self.prompt = Some(Prompt {
                        kind: PromptKind::Move(uids),
                        input: TextInput::default(),
                    });
                }
            }
            KeyCode::Enter => {
                if let Some(uid) = self.current_uid() {
                    self.reader = None;
                    self.screen = Screen::Reader;
                    self.loading = true;
                    return Action::Worker(Command::Fetch(uid));
                }
            }
            _ => {}
        }
        Action::None
    }

    fn on_reader_key(&mut self, key: KeyEvent) -> Action {
        let Some(reader) = &mut self.reader else {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                self.screen = Screen::Messages;
            }
            return Action::None;
        };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::Messages,
            KeyCode::Down | KeyCode::Char('j') => reader.scroll_down(1),
            KeyCode::Up | KeyCode::Char('k') => reader.scroll_up(1),
            KeyCode::PageDown | KeyCode::Char(' ') => reader.scroll_down(SCROLL_PAGE),
            KeyCode::PageUp => reader.scroll_up(SCROLL_PAGE),
            KeyCode::Char('r') => {
                let form = compose::reply_to(&reader.message);
                self.open_compose(form);
            }
            KeyCode::Char('F') => {
                let form = compose::forward(&reader.message, false);
                self.open_compose(form);
            }
            KeyCode::Char('E') => {
                let form = compose::forward(&reader.message, true);
                self.open_compose(form);
            }
            KeyCode::Char('o') => {
                let uid = reader.message.uid;
                if let Some(html) = reader.message.html.clone() {
                    return Action::OpenHtml { uid, html };
                }
                self.info("This message has no HTML part");
            }
            _ => {}
        }
        Action::None
    }

    fn on_drafts_key(&mut self, key: KeyEvent) -> Action {
        let len = self.draft_list.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = self.back,
            KeyCode::Down | KeyCode::Char('j') => {
                self.draft_cursor = step(self.draft_cursor, len, true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.draft_cursor = step(self.draft_cursor, len, false);
            }
            KeyCode::Enter => {
                if let Some(draft) = self.draft_list.get(self.draft_cursor).cloned() {
                    let back = self.back;
                    self.open_compose(ComposeForm::from(draft));
                    self.back = back;
                }
            }
            KeyCode::Char('x') => {
                let (Some(draft), Some(drafts)) =
                    (self.draft_list.get(self.draft_cursor), &self.drafts)
                else {
                    return Action::None;
                };
                match drafts.delete(&draft.id) {
                    Ok(_) => {
                        self.draft_list.remove(self.draft_cursor);
                        self.draft_cursor =
                            self.draft_cursor.min(self.draft_list.len().saturating_sub(1));
                        self.info("Draft deleted");
                    }
                    Err(e) => self.error(format!("Could not delete draft: {e}")),
                }
            }
            _ => {}
        }
        Action::None
    }

    fn on_manager_key(&mut self, key: KeyEvent) -> Action {
        let len = self.mailboxes.len();
        let current = self.mailboxes.get(self.mailbox_cursor).map(|m| m.path.clone());
        let prompt = |kind| Prompt {
            kind,
            input: TextInput::default(),
        };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = self.back,
            KeyCode::Down | KeyCode::Char('j') => {
                self.mailbox_cursor = step(self.mailbox_cursor, len, true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.mailbox_cursor = step(self.mailbox_cursor, len, false);
            }
            KeyCode::Char('a') => self.prompt = Some(prompt(PromptKind::CreateMailbox)),
            KeyCode::Char('r') => {
                if let Some(path) = current {
                    self.prompt = Some(Prompt {
                        input: TextInput::new(path.clone()),
                        kind: PromptKind::RenameMailbox(path),
                    });
                }
            }
            KeyCode::Char('x') => {
                if let Some(path) = current {
                    self.prompt = Some(prompt(PromptKind::DeleteMailbox(path)));
                }
            }
            _ => {}
        }
        Action::None
    }
}
