//! Infrastructure error type.

use std::path::PathBuf;

use authflow_common::AuthError;
use thiserror::Error;

/// Failures raised while wiring production adapters.
#[derive(Debug, Error)]
pub enum InfraError {
    /// Missing or invalid setting
    #[error("configuration error: {0}")]
    Config(String),

    /// Config file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`Settings`](crate::config::Settings)
    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        /// File that was being parsed
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// Loopback listener could not be bound
    #[error("failed to bind loopback listener on {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result alias for infrastructure operations.
pub type InfraResult<T> = Result<T, InfraError>;

impl From<InfraError> for AuthError {
    fn from(value: InfraError) -> Self {
        AuthError::Config(value.to_string())
    }
}
