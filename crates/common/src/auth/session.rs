//! Observable session state
//!
//! The manager publishes an immutable [`SessionSnapshot`] after every
//! transition through a `tokio::sync::watch` channel. Observers never see a
//! half-applied update.

use std::fmt;

use tokio::sync::watch;

use super::types::UserProfile;

/// Phase of the session state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No token in memory
    #[default]
    SignedOut,
    /// A login attempt is waiting for the external authorization UI
    AuthorizingPending,
    /// The authorization code is being traded for tokens
    Exchanging,
    /// A valid token and profile are loaded
    SignedIn,
    /// A refresh grant is in flight
    Refreshing,
    /// Transient; always followed by `SignedOut` or `SignedIn`
    Error(String),
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedOut => f.write_str("signed out"),
            Self::AuthorizingPending => f.write_str("authorizing"),
            Self::Exchanging => f.write_str("exchanging code"),
            Self::SignedIn => f.write_str("signed in"),
            Self::Refreshing => f.write_str("refreshing"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// UI-facing projection of the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Current state machine phase
    pub phase: SessionPhase,
    /// True while a network operation is in flight
    pub loading: bool,
    /// Signed-in user, if any
    pub user: Option<UserProfile>,
    /// Last user-facing failure, cleared on the next attempt
    pub error_message: Option<String>,
}

impl SessionSnapshot {
    /// Whether the phase is `SignedIn`
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.phase == SessionPhase::SignedIn
    }
}

/// Publisher side of the snapshot channel
#[derive(Debug)]
pub(crate) struct SessionState {
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.tx.borrow().phase.clone()
    }

    /// Apply one transition and notify observers
    pub(crate) fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_modify(apply);
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.update(|s| s.phase = phase);
    }

    /// Publish `Error(message)`, then settle on `next` with the message kept
    pub(crate) fn fail(&self, message: String, next: SessionPhase) {
        self.update(|s| {
            s.phase = SessionPhase::Error(message.clone());
            s.error_message = Some(message);
        });
        self.set_phase(next);
    }

    /// Set `loading` and return a guard that clears it when dropped
    pub(crate) fn begin_loading(&self) -> LoadingGuard<'_> {
        self.update(|s| s.loading = true);
        LoadingGuard { state: self }
    }
}

/// Clears the loading flag on every exit path, unwinding included
#[must_use = "loading is cleared when the guard is dropped"]
pub(crate) struct LoadingGuard<'a> {
    state: &'a SessionState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.update(|s| s.loading = false);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::session.
    use super::*;

    /// Validates `LoadingGuard` clears loading on drop.
    ///
    /// Assertions:
    /// - Confirms loading is set while the guard lives.
    /// - Confirms loading is cleared after an early return.
    #[test]
    fn test_loading_guard_clears_on_drop() {
        let state = SessionState::new();

        fn early_return(state: &SessionState) -> Result<(), ()> {
            let _guard = state.begin_loading();
            assert!(state.snapshot().loading);
            Err(())
        }

        assert!(early_return(&state).is_err());
        assert!(!state.snapshot().loading);
    }

    /// Validates `LoadingGuard` behavior when the guarded code panics.
    ///
    /// Assertions:
    /// - Ensures loading is cleared during unwinding.
    #[test]
    fn test_loading_guard_clears_on_panic() {
        let state = SessionState::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = state.begin_loading();
            panic!("handler failure");
        }));

        assert!(result.is_err());
        assert!(!state.snapshot().loading);
    }

    /// Validates `SessionState::fail` publishes the error then settles.
    ///
    /// Assertions:
    /// - Confirms the final phase is the follow-up phase.
    /// - Confirms the error message is retained.
    /// - Confirms subscribers observe the change.
    #[tokio::test]
    async fn test_fail_settles_on_next_phase() {
        let state = SessionState::new();
        let mut rx = state.subscribe();

        state.fail("Login canceled.".to_string(), SessionPhase::SignedOut);

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.phase, SessionPhase::SignedOut);
        assert_eq!(snapshot.error_message.as_deref(), Some("Login canceled."));
    }
}
