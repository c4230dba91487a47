//! Process-wide session state. One [`SessionStore`] is created at startup and
//! handed to whatever needs it; clones share the same state. Only the lifecycle
//! writes to it, everything else reads snapshots or subscribes.

use crate::session::role::Role;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Identity shown by the UI for a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub subject: String,
    pub role: Role,
}

/// Snapshot of the session. `is_authenticated` is derived from `user`, so the
/// two can never disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    user: Option<SessionUser>,
    loading: bool,
}

impl Session {
    /// State before bootstrap has resolved.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    #[must_use]
    pub const fn authenticated(user: SessionUser) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

impl Serialize for Session {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Session", 3)?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field("isAuthenticated", &self.is_authenticated())?;
        state.serialize_field("loading", &self.loading)?;
        state.end()
    }
}

/// Shared handle to the session state.
#[derive(Clone, Debug)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Creates the store in the pending (`loading`) state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::pending());
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn get(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Resolves the session to `user` and notifies subscribers.
    ///
    /// Every write produces a resolved state, so once `loading` drops to false
    /// it can never come back.
    pub(crate) fn set(&self, user: Option<SessionUser>) {
        let next = match user {
            Some(user) => Session::authenticated(user),
            None => Session::anonymous(),
        };
        debug!(
            authenticated = next.is_authenticated(),
            role = next.role().map(Role::as_str),
            "session updated"
        );
        self.tx.send_replace(next);
    }

    /// Receiver that observes every transition. Dropping it has no effect on the store.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Waits until bootstrap has resolved the session, then returns the snapshot.
    // The binding ends the borrow of `rx` before it is dropped.
    #[allow(clippy::let_and_return)]
    pub async fn ready(&self) -> Session {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let resolved = match rx.wait_for(|session| !session.is_loading()).await {
            Ok(session) => session.clone(),
            Err(_) => self.get(),
        };
        resolved
    }
}
