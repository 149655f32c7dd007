//! Account management module.
//!
//! Provides account configuration, provider presets, validation and
//! optional keyring caching of the vault passphrase.

pub mod credentials;
mod model;
mod validation;

pub use credentials::{CredentialError, CredentialResult};
pub use model::{Account, Provider, ProviderPreset, ServerConfig};
pub use validation::{ServerRole, ValidationError, ValidationResult, validate_account};
