//! Generic secret storage
//!
//! [`SecretStore`] is the key-value seam the keychain-backed token store is
//! written against. The keyring implementation lives behind the `platform`
//! feature; an in-memory one is in [`crate::testing`].

#[cfg(feature = "platform")]
pub mod keychain;

#[cfg(feature = "platform")]
pub use keychain::KeychainProvider;
use thiserror::Error;

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Entry exists but its bytes are not a valid UTF-8 secret
    #[error("Stored secret is not valid UTF-8: {0}")]
    Undecodable(String),
}

/// String secrets addressed by key within one service
pub trait SecretStore: Send + Sync {
    /// Store a secret, replacing any existing value
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the store rejects the write
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Retrieve a secret
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if the secret doesn't exist
    /// Returns `KeychainError::Undecodable` if the stored bytes are not text
    /// Returns `KeychainError::AccessFailed` if the store is unavailable
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Delete a secret (idempotent)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the store is unavailable
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Check if a secret exists
    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}
