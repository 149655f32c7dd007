//! A JSON document sealed on disk.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::crypto::{CryptoError, Envelope, SealingKey};
use super::{StoreError, StoreResult, ensure_dir};

/// Typed handle to one encrypted JSON file.
///
/// The key is derived once when the handle is opened: from the salt already
/// stored in the file, or from a fresh salt for a file that does not exist
/// yet.
#[derive(Debug)]
pub struct EncryptedFile<T> {
    path: PathBuf,
    key: SealingKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> EncryptedFile<T> {
    /// Open (without reading) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is unreadable or not an envelope.
    pub fn open(path: impl Into<PathBuf>, passphrase: &str) -> StoreResult<Self> {
        let path = path.into();
        let key = match read_envelope(&path)? {
            Some(envelope) => SealingKey::for_envelope(passphrase, &envelope)?,
            None => SealingKey::generate(passphrase)?,
        };
        Ok(Self {
            path,
            key,
            _marker: PhantomData,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Decrypt and deserialize. `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decrypt`] for a wrong passphrase.
    pub fn load(&self) -> StoreResult<Option<T>> {
        let Some(envelope) = read_envelope(&self.path)? else {
            return Ok(None);
        };
        let plaintext = self.key.open(&envelope).map_err(|e| match e {
            CryptoError::Decryption => StoreError::Decrypt(self.path.clone()),
            other => StoreError::Crypto(other),
        })?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// Serialize, encrypt and atomically replace the file.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the write fails.
    pub fn save(&self, value: &T) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }

        let plaintext = serde_json::to_vec(value)?;
        let envelope = self.key.seal(&plaintext)?;
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Saved encrypted file");
        Ok(())
    }
}

fn read_envelope(path: &Path) -> StoreResult<Option<Envelope>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Doc {
        value: String,
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = EncryptedFile::<Doc>::open(dir.path().join("doc.json"), "pw").unwrap();
        assert!(!file.exists());
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let file = EncryptedFile::<Doc>::open(&path, "pw").unwrap();
        file.save(&Doc { value: "secret".into() }).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret"));
        assert!(raw.contains("ciphertext"));

        let reopened = EncryptedFile::<Doc>::open(&path, "pw").unwrap();
        assert_eq!(reopened.load().unwrap(), Some(Doc { value: "secret".into() }));
    }

    #[test]
    fn test_wrong_passphrase_is_decrypt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        EncryptedFile::<Doc>::open(&path, "right")
            .unwrap()
            .save(&Doc { value: "x".into() })
            .unwrap();

        let wrong = EncryptedFile::<Doc>::open(&path, "wrong").unwrap();
        assert!(matches!(wrong.load(), Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let file = EncryptedFile::<Doc>::open(&path, "pw").unwrap();
        file.save(&Doc { value: "x".into() }).unwrap();
        assert!(file.exists());
    }
}
