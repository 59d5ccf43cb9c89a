//! Test doubles for the injected capabilities
//!
//! - **[`mocks`]**: in-memory token store, scripted HTTP executor, scripted
//!   authorization UI and an in-memory secret store
//! - **[`time`]**: controllable clock
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use authflow_common::testing::{InMemoryTokenStore, MockHttpExecutor};
//! use authflow_common::{OAuthConfig, TokenLifecycleManager};
//!
//! let config = OAuthConfig::google("client", "com.example.app:/cb").unwrap();
//! let manager = TokenLifecycleManager::new(
//!     config,
//!     Arc::new(InMemoryTokenStore::new()),
//!     Arc::new(MockHttpExecutor::new()),
//! );
//! assert!(!manager.snapshot().loading);
//! ```

pub mod mocks;
pub mod time;

pub use mocks::{
    state_param, InMemoryTokenStore, MockAuthorizationUi, MockHttpExecutor, MockKeychainProvider,
};
pub use time::MockClock;
