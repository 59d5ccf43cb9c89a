//! Configuration loader
//!
//! Loads [`Settings`] from environment variables or a TOML file.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if one exists
//! 2. Attempts to load from environment variables
//! 3. If required variables are missing, falls back to a TOML file
//! 4. Probes multiple paths for the file
//!
//! ## Environment Variables
//! - `AUTHFLOW_CLIENT_ID`: OAuth client ID (required)
//! - `AUTHFLOW_REDIRECT_URI`: Redirect URI registered with the provider
//!   (required)
//! - `AUTHFLOW_SCOPES`: Scopes, separated by spaces or commas
//! - `AUTHFLOW_KEYCHAIN_SERVICE`: Keyring service name
//! - `AUTHFLOW_STORAGE_ACCOUNT`: Account key of the persisted token record
//! - `AUTHFLOW_HTTP_TIMEOUT_SECS`: Token endpoint timeout in seconds
//! - `AUTHFLOW_LOG`: Log filter directive
//! - `AUTHFLOW_LOG_JSON`: Whether to log JSON (true/false)
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./authflow.toml` (current working directory)
//! 2. `../authflow.toml` (parent directory)
//! 3. Next to the executable

use std::path::PathBuf;

use tracing::{debug, info};

use super::{HttpSettings, LoggingSettings, OAuthSettings, Settings, StorageSettings};
use crate::errors::{InfraError, InfraResult};

/// File name searched for by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "authflow.toml";

/// Load settings with automatic fallback strategy
///
/// # Errors
/// Returns an error if neither the environment nor any config file yields
/// complete settings.
pub fn load() -> InfraResult<Settings> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => debug!(error = %e, "Ignoring unreadable .env file"),
    }

    match load_from_env() {
        Ok(settings) => {
            info!("Configuration loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load settings from `AUTHFLOW_*` environment variables
///
/// # Errors
/// Returns `InfraError::Config` if a required variable is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> InfraResult<Settings> {
    let client_id = env_var("AUTHFLOW_CLIENT_ID")?;
    let redirect_uri = env_var("AUTHFLOW_REDIRECT_URI")?;
    let scopes = std::env::var("AUTHFLOW_SCOPES").map(|s| split_scopes(&s)).unwrap_or_default();

    let mut storage = StorageSettings::default();
    if let Ok(service) = std::env::var("AUTHFLOW_KEYCHAIN_SERVICE") {
        storage.keychain_service = service;
    }
    if let Ok(account) = std::env::var("AUTHFLOW_STORAGE_ACCOUNT") {
        storage.account = account;
    }

    let mut http = HttpSettings::default();
    if let Ok(raw) = std::env::var("AUTHFLOW_HTTP_TIMEOUT_SECS") {
        http.timeout_secs = raw
            .parse::<u64>()
            .map_err(|e| InfraError::Config(format!("Invalid http timeout: {e}")))?;
    }

    let mut logging = LoggingSettings::default();
    if let Ok(level) = std::env::var("AUTHFLOW_LOG") {
        logging.level = level;
    }
    logging.json = env_bool("AUTHFLOW_LOG_JSON", false);

    Ok(Settings {
        oauth: OAuthSettings { client_id, redirect_uri, scopes },
        storage,
        http,
        logging,
    })
}

/// Load settings from a TOML file
///
/// If `path` is `None`, searches the standard locations.
///
/// # Errors
/// Returns `InfraError::Config` if no file is found, `InfraError::Io` if it
/// cannot be read and `InfraError::Toml` if it does not parse.
pub fn load_from_file(path: Option<PathBuf>) -> InfraResult<Settings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(InfraError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            InfraError::Config(format!("No {CONFIG_FILE_NAME} found in any of the standard locations"))
        })?,
    };

    info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| InfraError::Io { path: config_path.clone(), source })?;

    toml::from_str(&contents).map_err(|source| InfraError::Toml { path: config_path, source })
}

/// Probe multiple paths for the configuration file
///
/// # Returns
/// The first file found, or `None` if none exists.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
        candidates.push(cwd.join("..").join(CONFIG_FILE_NAME));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(CONFIG_FILE_NAME));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get required environment variable
fn env_var(key: &str) -> InfraResult<String> {
    std::env::var(key)
        .map_err(|_| InfraError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 8] = [
        "AUTHFLOW_CLIENT_ID",
        "AUTHFLOW_REDIRECT_URI",
        "AUTHFLOW_SCOPES",
        "AUTHFLOW_KEYCHAIN_SERVICE",
        "AUTHFLOW_STORAGE_ACCOUNT",
        "AUTHFLOW_HTTP_TIMEOUT_SECS",
        "AUTHFLOW_LOG",
        "AUTHFLOW_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("AUTHFLOW_TEST_BOOL", value);
            assert!(env_bool("AUTHFLOW_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("AUTHFLOW_TEST_BOOL", value);
            assert!(!env_bool("AUTHFLOW_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("AUTHFLOW_TEST_BOOL");
        assert!(env_bool("AUTHFLOW_TEST_BOOL", true));
        assert!(!env_bool("AUTHFLOW_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("AUTHFLOW_CLIENT_ID", "client123");
        std::env::set_var("AUTHFLOW_REDIRECT_URI", "com.example.app:/oauth2redirect");
        std::env::set_var("AUTHFLOW_SCOPES", "openid, email");
        std::env::set_var("AUTHFLOW_KEYCHAIN_SERVICE", "com.example.app");
        std::env::set_var("AUTHFLOW_STORAGE_ACCOUNT", "work.oauth.state");
        std::env::set_var("AUTHFLOW_HTTP_TIMEOUT_SECS", "10");
        std::env::set_var("AUTHFLOW_LOG", "authflow_common=debug");
        std::env::set_var("AUTHFLOW_LOG_JSON", "yes");

        let result = load_from_env();
        clear_env();
        let settings = result.expect("settings from env");

        assert_eq!(settings.oauth.client_id, "client123");
        assert_eq!(settings.oauth.redirect_uri, "com.example.app:/oauth2redirect");
        assert_eq!(settings.oauth.scopes, vec!["openid".to_string(), "email".to_string()]);
        assert_eq!(settings.storage.keychain_service, "com.example.app");
        assert_eq!(settings.storage.account, "work.oauth.state");
        assert_eq!(settings.http.timeout_secs, 10);
        assert_eq!(settings.logging.level, "authflow_common=debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn test_load_from_env_defaults_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("AUTHFLOW_CLIENT_ID", "client123");
        std::env::set_var("AUTHFLOW_REDIRECT_URI", "com.example.app:/oauth2redirect");

        let result = load_from_env();
        clear_env();
        let settings = result.expect("settings from env");

        assert!(settings.oauth.scopes.is_empty());
        assert_eq!(settings.storage, StorageSettings::default());
        assert_eq!(settings.http, HttpSettings::default());
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_load_from_env_missing_client_id() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("AUTHFLOW_REDIRECT_URI", "com.example.app:/oauth2redirect");
        let result = load_from_env();
        clear_env();

        match result {
            Err(InfraError::Config(msg)) => assert!(msg.contains("AUTHFLOW_CLIENT_ID")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_env_invalid_timeout() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("AUTHFLOW_CLIENT_ID", "client123");
        std::env::set_var("AUTHFLOW_REDIRECT_URI", "com.example.app:/oauth2redirect");
        std::env::set_var("AUTHFLOW_HTTP_TIMEOUT_SECS", "soon");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(InfraError::Config(_))));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().expect("temp file");
        writeln!(
            file,
            r#"
[oauth]
client_id = "client123"
redirect_uri = "http://127.0.0.1:8765/callback"
scopes = ["openid", "email", "profile"]

[storage]
account = "desktop.oauth.state"

[logging]
json = true
"#
        )
        .expect("write config");

        let settings = load_from_file(Some(file.path().to_path_buf())).expect("settings");

        assert_eq!(settings.oauth.redirect_uri, "http://127.0.0.1:8765/callback");
        assert_eq!(settings.oauth.scopes.len(), 3);
        assert_eq!(settings.storage.account, "desktop.oauth.state");
        assert_eq!(settings.storage.keychain_service, "authflow");
        assert_eq!(settings.http.timeout_secs, 30);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.logging.json);
    }

    #[test]
    fn test_load_from_file_missing_oauth_table() {
        let mut file = Builder::new().suffix(".toml").tempfile().expect("temp file");
        writeln!(file, "[logging]\nlevel = \"debug\"").expect("write config");

        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(InfraError::Toml { .. })));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/authflow.toml")));
        match result {
            Err(InfraError::Config(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_split_scopes() {
        assert_eq!(split_scopes("openid email,profile"), vec!["openid", "email", "profile"]);
        assert!(split_scopes(" , ").is_empty());
    }
}
