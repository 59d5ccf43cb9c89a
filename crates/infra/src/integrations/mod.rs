//! External authorization UI implementations

pub mod loopback;

pub use loopback::LoopbackAuthorizationUi;
