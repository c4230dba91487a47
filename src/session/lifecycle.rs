//! Session lifecycle: the only writer of [`SessionStore`].
//!
//! Flow Overview:
//! - `bootstrap` runs once at startup, restores the session from the stored
//!   credential and evicts stored credentials that are malformed or expired.
//! - `login` persists the credential pair handed over by the login form and
//!   signs the user in with the role the API returned alongside it.
//! - `logout` clears persistence and the in-memory session.
//!
//! Operations are serialized, so a login issued while bootstrap is still
//! reading storage runs after bootstrap has resolved. A login or logout that
//! arrives before bootstrap was ever started runs it first.

use crate::session::{
    clock::{Clock, SystemClock},
    role::Role,
    state::{SessionStore, SessionUser},
    storage::{CredentialStore, PersistedCredential, StoreError},
    token::{self, Credential, DecodeError},
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed credential: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bootstrap task failed: {0}")]
    Bootstrap(#[from] tokio::task::JoinError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    Malformed,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Nothing was stored.
    Anonymous,
    Authenticated(SessionUser),
    /// A stored credential was unusable and has been removed.
    Evicted(EvictionReason),
    /// Bootstrap had already completed; nothing was read or changed.
    AlreadyBootstrapped,
}

/// Payload returned by the API's login endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginGrant {
    pub token: Credential,
    pub role: Role,
}

#[derive(Default)]
struct OpState {
    bootstrapped: bool,
}

pub struct SessionLifecycle<S> {
    store: S,
    session: SessionStore,
    clock: Arc<dyn Clock>,
    ops: Mutex<OpState>,
}

impl<S: CredentialStore> SessionLifecycle<S> {
    pub fn new(store: S, session: SessionStore) -> Self {
        Self::with_clock(store, session, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, session: SessionStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            session,
            clock,
            ops: Mutex::new(OpState::default()),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restores the session from storage. Runs at most once.
    ///
    /// Malformed and expired credentials resolve to a signed-out session and
    /// are removed from storage; they are never reported as errors. Storage
    /// failures also resolve the session to signed out, then return the error.
    ///
    /// Dropping this future before it finishes leaves the session pending; use
    /// [`SessionLifecycle::spawn_bootstrap`] when the caller may go away first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if reading or evicting the stored
    /// credential fails.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<BootstrapOutcome, SessionError> {
        let mut ops = self.ops.lock().await;
        if ops.bootstrapped {
            debug!("bootstrap already completed");
            return Ok(BootstrapOutcome::AlreadyBootstrapped);
        }

        self.bootstrap_locked(&mut ops).await
    }

    async fn bootstrap_locked(&self, ops: &mut OpState) -> Result<BootstrapOutcome, SessionError> {
        let outcome = self.restore().await;
        ops.bootstrapped = true;
        outcome
    }

    /// Resolves the pending session before `operation` writes to it.
    async fn bootstrap_before(&self, ops: &mut OpState, operation: &str) {
        if ops.bootstrapped {
            return;
        }
        debug!("{operation} requested before bootstrap");
        if let Err(err) = self.bootstrap_locked(ops).await {
            warn!("bootstrap before {operation} failed: {err}");
        }
    }

    async fn restore(&self) -> Result<BootstrapOutcome, SessionError> {
        let stored = match self.store.read().await {
            Ok(stored) => stored,
            Err(err) => {
                error!("failed to read stored credential: {err}");
                self.session.set(None);
                return Err(err.into());
            }
        };

        let Some(stored) = stored else {
            self.session.set(None);
            debug!("no stored credential");
            return Ok(BootstrapOutcome::Anonymous);
        };

        let reason = match token::decode(stored.credential.expose()) {
            Ok(claims) if !claims.is_expired_at(self.clock.now()) => {
                // The decoded role wins over the stored role hint.
                let user = SessionUser {
                    subject: claims.subject,
                    role: claims.role,
                };
                self.session.set(Some(user.clone()));
                info!(role = %user.role, "session restored");
                return Ok(BootstrapOutcome::Authenticated(user));
            }
            Ok(claims) => {
                info!(expiry = claims.expiry, "stored credential expired");
                EvictionReason::Expired
            }
            Err(err) => {
                warn!("stored credential is malformed: {err}");
                EvictionReason::Malformed
            }
        };

        let cleared = self.store.clear().await;
        self.session.set(None);
        cleared?;
        Ok(BootstrapOutcome::Evicted(reason))
    }

    /// Runs [`SessionLifecycle::bootstrap`] as a detached one-time task.
    ///
    /// The task finishes even if every consumer is gone, so the shared store
    /// always resolves.
    pub fn spawn_bootstrap(self: &Arc<Self>) -> BootstrapTask
    where
        S: 'static,
    {
        let lifecycle = Arc::clone(self);
        BootstrapTask {
            handle: tokio::spawn(async move { lifecycle.bootstrap().await }),
        }
    }

    /// Persists the credential pair and signs the user in as `role`.
    ///
    /// `role` is trusted as given, even when the credential carries a different
    /// role claim; the credential is decoded only for its subject. If bootstrap
    /// has not run yet it runs first, and a failure there is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Decode`] if the credential is malformed and
    /// [`SessionError::Store`] if it cannot be persisted. In both cases the
    /// login itself changes neither storage nor the session.
    #[instrument(skip(self, credential), fields(role = %role))]
    pub async fn login(
        &self,
        credential: impl Into<Credential>,
        role: Role,
    ) -> Result<SessionUser, SessionError> {
        let credential = credential.into();
        let mut ops = self.ops.lock().await;

        let claims = token::decode(credential.expose()).inspect_err(|err| {
            error!("login received a malformed credential: {err}");
        })?;
        if claims.role != role {
            debug!(claimed = %claims.role, "credential role differs from login role");
        }

        self.bootstrap_before(&mut ops, "login").await;

        self.store
            .write(&PersistedCredential::new(credential, role.as_str()))
            .await?;

        let user = SessionUser {
            subject: claims.subject,
            role,
        };
        self.session.set(Some(user.clone()));
        info!("signed in");
        Ok(user)
    }

    /// [`SessionLifecycle::login`] with the API's login response.
    ///
    /// # Errors
    ///
    /// Same as [`SessionLifecycle::login`].
    pub async fn login_with_grant(&self, grant: LoginGrant) -> Result<SessionUser, SessionError> {
        self.login(grant.token, grant.role).await
    }

    /// Clears storage and signs out. Calling it while signed out is harmless.
    /// Runs bootstrap first if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage cannot be cleared; a signed-in
    /// session stays signed in.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        let mut ops = self.ops.lock().await;
        self.bootstrap_before(&mut ops, "logout").await;
        self.store.clear().await?;
        self.session.set(None);
        info!("signed out");
        Ok(())
    }
}

/// Handle to a spawned bootstrap.
#[derive(Debug)]
pub struct BootstrapTask {
    handle: JoinHandle<Result<BootstrapOutcome, SessionError>>,
}

impl BootstrapTask {
    /// Waits for bootstrap to finish.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error, or [`SessionError::Bootstrap`] if the task
    /// panicked or was aborted.
    pub async fn wait(self) -> Result<BootstrapOutcome, SessionError> {
        self.handle.await?
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
