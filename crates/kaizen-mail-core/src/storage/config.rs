//! Persisted client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{EncryptedFile, StoreResult};
use crate::account::Account;

const CONFIG_FILE: &str = "config.json";

/// Signature body format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureFormat {
    /// Plain text.
    #[default]
    Text,
    /// HTML fragment.
    Html,
}

/// Outgoing mail signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Whether the signature is appended.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Body format.
    #[serde(default)]
    pub format: SignatureFormat,
    /// Signature body.
    #[serde(default)]
    pub content: String,
}

const fn default_enabled() -> bool {
    true
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            enabled: true,
            format: SignatureFormat::Text,
            content: String::new(),
        }
    }
}

impl Signature {
    /// Returns the signature only when it is enabled and non-empty.
    #[must_use]
    pub fn active(&self) -> Option<&Self> {
        (self.enabled && !self.content.trim().is_empty()).then_some(self)
    }
}

/// Top-level configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The configured account.
    pub account: Account,
    /// Mailbox to reopen at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_selected_mailbox: Option<String>,
    /// Outgoing signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl Config {
    /// Config for a freshly onboarded account.
    #[must_use]
    pub const fn new(account: Account) -> Self {
        Self {
            account,
            last_selected_mailbox: None,
            signature: None,
        }
    }
}

/// Encrypted `config.json` in the config directory.
#[derive(Debug)]
pub struct ConfigStore {
    file: EncryptedFile<Config>,
}

impl ConfigStore {
    /// Whether a config file already exists in `dir`.
    #[must_use]
    pub fn exists_in(dir: &Path) -> bool {
        dir.join(CONFIG_FILE).exists()
    }

    /// Open the store in `dir` with the user's passphrase.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn open(dir: &Path, passphrase: &str) -> StoreResult<Self> {
        Ok(Self {
            file: EncryptedFile::open(dir.join(CONFIG_FILE), passphrase)?,
        })
    }

    /// Path of the config file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Load the config, `None` before onboarding.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Decrypt`] for a wrong passphrase.
    pub fn load(&self) -> StoreResult<Option<Config>> {
        self.file.load()
    }

    /// Persist the whole config.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save(&self, config: &Config) -> StoreResult<()> {
        self.file.save(config)?;
        info!("Configuration saved");
        Ok(())
    }

    /// Remember the mailbox to reopen next time. No-op before onboarding.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn set_last_selected_mailbox(&self, path: &str) -> StoreResult<()> {
        self.update(|config| config.last_selected_mailbox = Some(path.to_string()))
    }

    /// Replace the signature. No-op before onboarding.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn set_signature(&self, signature: Signature) -> StoreResult<()> {
        self.update(|config| config.signature = Some(signature))
    }

    fn update(&self, f: impl FnOnce(&mut Config)) -> StoreResult<()> {
        let Some(mut config) = self.load()? else {
            return Ok(());
        };
        f(&mut config);
        self.file.save(&config)
    }
}
