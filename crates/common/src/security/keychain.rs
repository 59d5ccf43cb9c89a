//! Platform keychain provider for secure credential storage
//!
//! Thin wrapper over the platform keychain across macOS (Keychain Access),
//! Windows (Credential Manager), and Linux (Secret Service API).
//!
//! ## Usage
//!
//! ```no_run
//! use authflow_common::security::{KeychainProvider, SecretStore};
//!
//! let keychain = KeychainProvider::new("com.example.authflow");
//! keychain.set_secret("google.oauth.state", "{}")?;
//! let secret = keychain.get_secret("google.oauth.state")?;
//! assert_eq!(secret, "{}");
//! # Ok::<(), authflow_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use tracing::debug;

use super::{KeychainError, SecretStore};

/// Keyring-backed [`SecretStore`]
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Arguments
    /// * `service_name` - Service identifier (e.g., "com.example.authflow")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Keychain service the entries live under
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

impl SecretStore for KeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| map_get_error(key, e))
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }
}

fn map_get_error(key: &str, err: keyring::Error) -> KeychainError {
    match err {
        keyring::Error::NoEntry => KeychainError::NotFound,
        keyring::Error::BadEncoding(_) => KeychainError::Undecodable(key.to_string()),
        e => KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}")),
    }
}
