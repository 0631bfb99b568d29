//! Shared session state.
//!
//! `connected` and `session_token` move together under one lock: while
//! connected the token is non-empty, and clearing one clears both. Writers
//! hold the lock only across the assignment; the dispatcher reads the token
//! once per response when stamping.

use parking_lot::RwLock;

#[derive(Debug, Default)]
struct Shared {
    connected: bool,
    session_token: String,
}

/// Session-token cell owned by the session manager; handlers and the
/// dispatcher observe it read-only.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<Shared>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the token issued at Register and mark the session connected.
    pub fn set_registered(&self, session_token: String) {
        debug_assert!(!session_token.is_empty());
        let mut shared = self.inner.write();
        shared.session_token = session_token;
        shared.connected = true;
    }

    /// Invalidate the current token and mark disconnected. The old token is
    /// rejected locally from this point on.
    pub fn clear(&self) {
        let mut shared = self.inner.write();
        shared.session_token.clear();
        shared.connected = false;
    }

    /// Current session token; empty while unregistered.
    pub fn token(&self) -> String {
        self.inner.read().session_token.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().connected
    }
}
