//! Encrypted local storage.
//!
//! Everything written to disk (account, signature, drafts) goes through an
//! [`EncryptedFile`], which seals JSON with a key derived from the user's
//! passphrase.

mod config;
pub mod crypto;
mod drafts;
mod file;

use std::path::{Path, PathBuf};

pub use config::{Config, ConfigStore, Signature, SignatureFormat};
pub use crypto::{CryptoError, Envelope, SealingKey};
pub use drafts::{Draft, DraftAttachment, DraftInput, DraftStore, generate_draft_id};
pub use file::EncryptedFile;

/// Environment variable that overrides the config directory.
pub const HOME_ENV: &str = "KAIZEN_MAIL_HOME";

/// Errors from local storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File content is not valid JSON for the expected shape.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Wrong passphrase or corrupted file.
    #[error("Could not decrypt {0}: wrong passphrase or corrupted file")]
    Decrypt(PathBuf),

    /// Encryption layer failure other than authentication.
    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// No platform config directory and no override set.
    #[error("Could not determine a configuration directory; set {HOME_ENV}")]
    NoConfigDir,
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Resolve the config directory: `$KAIZEN_MAIL_HOME`, else the platform
/// config dir joined with `kaizen-mail`.
///
/// # Errors
///
/// Returns [`StoreError::NoConfigDir`] if neither is available.
pub fn config_dir() -> StoreResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::config_dir()
        .map(|dir| dir.join("kaizen-mail"))
        .ok_or(StoreError::NoConfigDir)
}

/// Create `dir` (and parents), owner-only on Unix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
