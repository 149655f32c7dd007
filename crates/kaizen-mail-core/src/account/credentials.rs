//! Optional passphrase caching in the system keyring.
//!
//! The configuration vault is unlocked with a user passphrase. Users who opt
//! in can keep that passphrase in the platform's credential store so the
//! unlock prompt is skipped:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::{debug, warn};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "kaizen-mail";

/// Credential type identifier for the vault passphrase.
const PASSPHRASE_CREDENTIAL: &str = "vault_passphrase";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Keyring entry for a vault, scoped by the profile label (usually the
/// config directory) so separate profiles don't share a passphrase.
fn passphrase_entry(profile: &str) -> CredentialResult<Entry> {
    let key = format!("{SERVICE_NAME}_{PASSPHRASE_CREDENTIAL}_{profile}");
    Ok(Entry::new(SERVICE_NAME, &key)?)
}

/// Stores the vault passphrase in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_passphrase(profile: &str, passphrase: &str) -> CredentialResult<()> {
    passphrase_entry(profile)?.set_password(passphrase)?;
    debug!(profile, "Stored vault passphrase in keyring");
    Ok(())
}

/// Retrieves the vault passphrase, `None` if the user never stored one.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_passphrase(profile: &str) -> CredentialResult<Option<String>> {
    match passphrase_entry(profile)?.get_password() {
        Ok(passphrase) => Ok(Some(passphrase)),
        Err(keyring::Error::NoEntry) => {
            debug!(profile, "No vault passphrase in keyring");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the stored passphrase. Missing entries are not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn delete_passphrase(profile: &str) -> CredentialResult<()> {
    match passphrase_entry(profile)?.delete_credential() {
        Ok(()) => {
            debug!(profile, "Deleted vault passphrase from keyring");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => {
            warn!("Failed to delete vault passphrase: {e}");
            Err(e.into())
        }
    }
}
