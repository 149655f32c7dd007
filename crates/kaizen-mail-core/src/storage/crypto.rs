//! Passphrase-based encryption for files at rest.
//!
//! A passphrase is stretched with Argon2id into an AES-256-GCM key. Each
//! sealed payload carries its own salt and a fresh 96-bit nonce, so two
//! writes of the same plaintext never produce the same ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Current envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Salt size for key derivation.
const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Encryption errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("Failed to derive encryption key: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authentication tag mismatch: wrong passphrase or tampered data.
    #[error("Decryption failed: wrong passphrase or corrupted file")]
    Decryption,

    /// The envelope is malformed.
    #[error("Invalid encrypted data format: {0}")]
    InvalidFormat(String),
}

/// On-disk representation of an encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Format version.
    pub version: u8,
    /// Base64 Argon2 salt.
    pub salt: String,
    /// Base64 AES-GCM nonce.
    pub nonce: String,
    /// Base64 ciphertext with authentication tag.
    pub ciphertext: String,
}

/// An AES-256-GCM key bound to the salt it was derived with.
pub struct SealingKey {
    cipher: Aes256Gcm,
    salt: [u8; SALT_SIZE],
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey").finish_non_exhaustive()
    }
}

impl SealingKey {
    /// Derive a key with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns an error if Argon2 rejects the parameters.
    pub fn generate(passphrase: &str) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self::derive(passphrase, salt)
    }

    /// Derive the key that sealed an existing envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope salt is malformed or derivation fails.
    pub fn for_envelope(passphrase: &str, envelope: &Envelope) -> Result<Self, CryptoError> {
        let bytes = decode_field("salt", &envelope.salt)?;
        let salt: [u8; SALT_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidFormat("salt has wrong length".to_string()))?;
        Self::derive(passphrase, salt)
    }

    fn derive(passphrase: &str, salt: [u8; SALT_SIZE]) -> Result<Self, CryptoError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        debug!("Derived vault key");
        Ok(Self {
            cipher: Aes256Gcm::new(&key.into()),
            salt,
        })
    }

    /// Encrypt `plaintext` into a new envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if AES-GCM encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Envelope, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(Envelope {
            version: ENVELOPE_VERSION,
            salt: BASE64.encode(self.salt),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt an envelope produced by [`SealingKey::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] for a wrong key or tampered data,
    /// [`CryptoError::InvalidFormat`] for malformed envelopes.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, CryptoError> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::InvalidFormat(format!(
                "unsupported version {}",
                envelope.version
            )));
        }

        let nonce = decode_field("nonce", &envelope.nonce)?;
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidFormat("nonce has wrong length".to_string()));
        }
        let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;

        self.cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decryption)
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::InvalidFormat(format!("{name}: {e}")))
}
