//! # Authflow Infrastructure
//!
//! Production implementations of the capabilities `authflow-common` injects.
//!
//! This crate contains:
//! - A reqwest-backed [`HttpExecutor`](authflow_common::HttpExecutor)
//! - Settings loading from `.env`, environment variables and TOML files
//! - `tracing-subscriber` setup
//! - A loopback-redirect [`AuthorizationUi`](authflow_common::AuthorizationUi)
//!
//! ## Architecture
//! - Implements traits defined in `authflow-common`
//! - Contains all "impure" code (sockets, files, process environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use config::{LoggingSettings, Settings};
pub use errors::{InfraError, InfraResult};
pub use http::{ReqwestExecutor, ReqwestExecutorBuilder};
pub use integrations::LoopbackAuthorizationUi;
pub use observability::init_tracing;
