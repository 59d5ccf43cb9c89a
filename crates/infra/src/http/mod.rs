//! HTTP transport for the token and userinfo endpoints.

pub mod client;

pub use client::{ReqwestExecutor, ReqwestExecutorBuilder};
