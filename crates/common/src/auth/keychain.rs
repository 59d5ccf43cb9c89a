//! Token record storage layered on top of a [`SecretStore`].
//!
//! # Module Layering
//!
//! - **`security`**: generic secret storage (platform keychain or in-memory)
//! - **`auth::keychain`** (this module): the JSON-encoded [`TokenRecord`]
//!   stored as one secret under the configured account key
//!
//! The security module stays independent of auth types.

use async_trait::async_trait;
use tracing::debug;

use super::traits::TokenStore;
use super::types::TokenRecord;
use crate::error::StoreError;
use crate::security::{KeychainError, SecretStore};

/// [`TokenStore`] persisting the token record in a [`SecretStore`]
#[derive(Debug)]
pub struct KeychainTokenStore<P: SecretStore> {
    provider: P,
    account: String,
}

impl<P: SecretStore> KeychainTokenStore<P> {
    /// # Arguments
    /// * `provider` - Secret store holding the record
    /// * `account` - Key under which the record is stored (e.g.
    ///   "google.oauth.state")
    pub fn new(provider: P, account: impl Into<String>) -> Self {
        Self { provider, account: account.into() }
    }

    /// Key under which the record is stored
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Underlying secret store
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

fn backend(err: KeychainError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl<P: SecretStore> TokenStore for KeychainTokenStore<P> {
    async fn load(&self) -> Result<Option<TokenRecord>, StoreError> {
        let raw = match self.provider.get_secret(&self.account) {
            Ok(raw) => raw,
            Err(KeychainError::NotFound) => {
                debug!(account = %self.account, "No stored token record");
                return Ok(None);
            }
            Err(KeychainError::Undecodable(detail)) => return Err(StoreError::Decode(detail)),
            Err(e) => return Err(backend(e)),
        };

        let record: TokenRecord = serde_json::from_str(&raw)?;
        debug!(account = %self.account, "Token record loaded");
        Ok(Some(record))
    }

    async fn save(&self, record: Option<&TokenRecord>) -> Result<(), StoreError> {
        match record {
            Some(record) => {
                let encoded =
                    serde_json::to_string(record).map_err(|e| StoreError::Backend(e.to_string()))?;
                self.provider.set_secret(&self.account, &encoded).map_err(backend)?;
                debug!(account = %self.account, "Token record stored");
            }
            None => {
                self.provider.delete_secret(&self.account).map_err(backend)?;
                debug!(account = %self.account, "Token record deleted");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Tests focus on record encoding; general secret handling lives with the
    //! providers.
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::testing::MockKeychainProvider;

    const ACCOUNT: &str = "google.oauth.state";

    fn sample_record() -> TokenRecord {
        TokenRecord {
            access_token: "T".to_string(),
            expires_at: Utc.with_ymd_and_hms(2025, 8, 17, 13, 0, 0).single().unwrap(),
            refresh_token: Some("R".to_string()),
        }
    }

    /// Validates `KeychainTokenStore` behavior for the store and load
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the loaded record equals the stored one.
    /// - Confirms the record sits under the configured account key.
    #[tokio::test]
    async fn store_and_load_record() {
        let store = KeychainTokenStore::new(MockKeychainProvider::new("test"), ACCOUNT);
        let record = sample_record();

        store.save(Some(&record)).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(record));
        assert!(store.provider().secret_exists(ACCOUNT));
    }

    /// Validates `KeychainTokenStore::save(None)` deletes idempotently.
    ///
    /// Assertions:
    /// - Ensures load returns `None` after deletion.
    /// - Ensures deleting twice succeeds.
    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = KeychainTokenStore::new(MockKeychainProvider::new("test"), ACCOUNT);
        store.save(Some(&sample_record())).await.unwrap();

        store.save(None).await.unwrap();
        store.save(None).await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    /// Validates the undecodable record scenario.
    ///
    /// Assertions:
    /// - Ensures garbage under the account key maps to `StoreError::Decode`.
    #[tokio::test]
    async fn undecodable_record_is_decode_error() {
        let provider = MockKeychainProvider::new("test");
        provider.set_secret(ACCOUNT, "not json").unwrap();
        let store = KeychainTokenStore::new(provider, ACCOUNT);

        assert!(matches!(store.load().await, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let provider = MockKeychainProvider::new("test");
        provider.fail_access(true);
        let store = KeychainTokenStore::new(provider, ACCOUNT);

        assert!(matches!(store.load().await, Err(StoreError::Backend(_))));
        assert!(matches!(store.save(None).await, Err(StoreError::Backend(_))));
    }

    /// Validates a secret whose bytes are not text.
    ///
    /// Assertions:
    /// - Ensures it maps to `StoreError::Decode` so restore deletes it.
    #[tokio::test]
    async fn non_utf8_secret_is_decode_error() {
        let provider = MockKeychainProvider::new("test");
        provider.corrupt(ACCOUNT);
        let store = KeychainTokenStore::new(provider, ACCOUNT);

        assert!(matches!(store.load().await, Err(StoreError::Decode(_))));

        store.save(None).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
