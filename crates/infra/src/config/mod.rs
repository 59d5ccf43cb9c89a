//! Configuration loading and management
//!
//! [`Settings`] is the deployable configuration of the session manager. It
//! is loaded from the environment or a TOML file by [`loader`] and turned
//! into an [`OAuthConfig`] with [`Settings::oauth_config`].

pub mod loader;

use std::time::Duration;

use authflow_common::auth::{KeychainTokenStore, OAuthConfig, DEFAULT_STORAGE_ACCOUNT};
use authflow_common::security::KeychainProvider;
use authflow_common::AuthResult;
use serde::Deserialize;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, find_config_file};

/// Default keyring service name
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "authflow";

/// Default log directive when neither `RUST_LOG` nor settings provide one
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Provider registration
    pub oauth: OAuthSettings,
    /// Where the token record is persisted
    #[serde(default)]
    pub storage: StorageSettings,
    /// Executor tuning
    #[serde(default)]
    pub http: HttpSettings,
    /// Tracing setup
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// `[oauth]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthSettings {
    /// OAuth client identifier
    pub client_id: String,
    /// Registered redirect URI
    pub redirect_uri: String,
    /// Empty means the provider defaults (`openid email profile`)
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// `[storage]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Keychain service name
    pub keychain_service: String,
    /// Account key for the token record
    pub account: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            account: DEFAULT_STORAGE_ACCOUNT.to_string(),
        }
    }
}

/// `[http]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpSettings {
    /// Timeout as a [`Duration`]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `authflow_common=debug`
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_DIRECTIVE.to_string(), json: false }
    }
}

impl Settings {
    /// Build the OAuth configuration for Google sign-in.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the result fails
    /// [`OAuthConfig::validate`].
    pub fn oauth_config(&self) -> AuthResult<OAuthConfig> {
        let mut config =
            OAuthConfig::google(self.oauth.client_id.clone(), self.oauth.redirect_uri.clone())?
                .with_storage_account(self.storage.account.clone())
                .with_token_timeout(self.http.timeout());
        if !self.oauth.scopes.is_empty() {
            config.scopes.clone_from(&self.oauth.scopes);
        }
        config.validate()?;
        Ok(config)
    }

    /// Token store in the platform keychain under the configured service.
    #[must_use]
    pub fn keychain_store(&self) -> KeychainTokenStore<KeychainProvider> {
        KeychainTokenStore::new(
            KeychainProvider::new(self.storage.keychain_service.clone()),
            self.storage.account.clone(),
        )
    }
}
