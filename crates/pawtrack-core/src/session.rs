// ── Session context ──
//
// Explicit owner of the bearer credential and of the process-wide
// "session invalid" signal. Handed to every component that talks to the
// backend instead of living in a global.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use pawtrack_api::BearerSource;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lifecycle: `Init → Active → Invalidated`. A new [`SessionContext::activate`]
/// is the only way out of `Invalidated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Active,
    Invalidated { reason: String },
}

/// Cheaply cloneable handle; all clones share one state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<SessionState>,
    token: ArcSwapOption<SecretString>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// A session in `Init` with no credential.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Init);
        Self {
            inner: Arc::new(SessionInner {
                state,
                token: ArcSwapOption::empty(),
            }),
        }
    }

    /// Shorthand for `new()` followed by `activate(token)`.
    pub fn with_token(token: SecretString) -> Self {
        let session = Self::new();
        session.activate(token);
        session
    }

    /// Install a credential and move to `Active`.
    pub fn activate(&self, token: SecretString) {
        self.inner.token.store(Some(Arc::new(token)));
        self.inner.state.send_replace(SessionState::Active);
        info!("session active");
    }

    /// Drop the credential and move to `Invalidated`. Idempotent: only the
    /// first call after activation is logged and observed.
    pub fn invalidate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.inner.token.store(None);
        let changed = self.inner.state.send_if_modified(|state| {
            if matches!(state, SessionState::Invalidated { .. }) {
                false
            } else {
                *state = SessionState::Invalidated {
                    reason: reason.clone(),
                };
                true
            }
        });
        if changed {
            warn!(%reason, "session invalidated");
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Active)
    }

    pub fn is_invalidated(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Invalidated { .. })
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }
}

impl BearerSource for SessionContext {
    fn bearer_token(&self) -> Option<SecretString> {
        if !self.is_active() {
            return None;
        }
        self.inner.token.load_full().map(|t| (*t).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn token(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn lifecycle_init_active_invalidated() {
        let session = SessionContext::new();
        assert_eq!(session.state(), SessionState::Init);
        assert!(session.bearer_token().is_none());

        session.activate(token("abc"));
        assert!(session.is_active());
        assert_eq!(
            session.bearer_token().map(|t| t.expose_secret().to_owned()),
            Some("abc".to_owned())
        );

        session.invalidate("401 from /pets");
        assert!(session.is_invalidated());
        assert!(session.bearer_token().is_none());
    }

    #[test]
    fn invalidate_is_idempotent_and_keeps_first_reason() {
        let session = SessionContext::with_token(token("abc"));
        let mut rx = session.subscribe();
        rx.borrow_and_update();

        session.invalidate("first");
        session.invalidate("second");

        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(
            session.state(),
            SessionState::Invalidated {
                reason: "first".into()
            }
        );
    }

    #[test]
    fn clones_share_state() {
        let a = SessionContext::new();
        let b = a.clone();
        a.activate(token("t"));
        assert!(b.is_active());
        b.invalidate("gone");
        assert!(a.is_invalidated());
    }

    #[test]
    fn reactivation_after_invalidation() {
        let session = SessionContext::with_token(token("old"));
        session.invalidate("expired");
        session.activate(token("new"));
        assert!(session.is_active());
    }
}
