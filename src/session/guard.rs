//! Render gate for protected views. UX only: the API enforces access on every
//! request, this just keeps users away from views they cannot use.

use crate::session::{
    role::Role,
    state::{Session, SessionStore},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Path of the sign-in page.
pub const LOGIN_PATH: &str = "/login";
/// Path shown to signed-in users who lack the required role.
pub const FORBIDDEN_PATH: &str = "/unauthorized";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Render,
    /// Session not resolved yet; show a placeholder, never redirect.
    Pending,
    RedirectToLogin,
    RedirectToForbidden,
}

impl Decision {
    /// Where the caller should navigate, if anywhere.
    #[must_use]
    pub const fn redirect_path(self) -> Option<&'static str> {
        match self {
            Decision::RedirectToLogin => Some(LOGIN_PATH),
            Decision::RedirectToForbidden => Some(FORBIDDEN_PATH),
            Decision::Render | Decision::Pending => None,
        }
    }
}

/// Roles allowed to render a view. Empty means any signed-in user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredRoles(BTreeSet<Role>);

impl RequiredRoles {
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    pub fn only(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn allows(&self, role: Role) -> bool {
        self.0.is_empty() || self.0.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for RequiredRoles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::only(iter)
    }
}

/// First match wins: pending, then signed out, then role mismatch.
#[must_use]
pub fn decide(session: &Session, required: &RequiredRoles) -> Decision {
    if session.is_loading() {
        return Decision::Pending;
    }
    let Some(user) = session.user() else {
        return Decision::RedirectToLogin;
    };
    if required.allows(user.role) {
        Decision::Render
    } else {
        Decision::RedirectToForbidden
    }
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    session: SessionStore,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    /// Decides against the current snapshot. Call on every render.
    #[must_use]
    pub fn authorize(&self, required: &RequiredRoles) -> Decision {
        decide(&self.session.get(), required)
    }

    /// Waits for bootstrap, so the answer is never [`Decision::Pending`].
    pub async fn authorize_ready(&self, required: &RequiredRoles) -> Decision {
        decide(&self.session.ready().await, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::SessionUser;

    fn signed_in(role: Role) -> Session {
        Session::authenticated(SessionUser {
            subject: "alice".to_string(),
            role,
        })
    }

    #[test]
    fn pending_wins_regardless_of_roles() {
        assert_eq!(
            decide(&Session::pending(), &RequiredRoles::only([Role::Admin])),
            Decision::Pending
        );
        assert_eq!(
            decide(&Session::pending(), &RequiredRoles::any()),
            Decision::Pending
        );
    }

    #[test]
    fn signed_out_redirects_to_login() {
        let decision = decide(&Session::anonymous(), &RequiredRoles::any());
        assert_eq!(decision, Decision::RedirectToLogin);
        assert_eq!(decision.redirect_path(), Some(LOGIN_PATH));
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let decision = decide(&signed_in(Role::Student), &RequiredRoles::only([Role::Admin]));
        assert_eq!(decision, Decision::RedirectToForbidden);
        assert_eq!(decision.redirect_path(), Some(FORBIDDEN_PATH));
    }

    #[test]
    fn matching_or_unrestricted_role_renders() {
        for role in Role::ALL {
            assert_eq!(
                decide(&signed_in(role), &RequiredRoles::any()),
                Decision::Render
            );
            assert_eq!(
                decide(&signed_in(role), &RequiredRoles::only([role])),
                Decision::Render
            );
        }
        let staff: RequiredRoles = [Role::Mentor, Role::Admin].into_iter().collect();
        assert_eq!(decide(&signed_in(Role::Mentor), &staff), Decision::Render);
        assert_eq!(Decision::Render.redirect_path(), None);
    }

    #[test]
    fn guard_follows_store_without_caching() {
        let store = SessionStore::new();
        let guard = RouteGuard::new(store.clone());
        let admin_only = RequiredRoles::only([Role::Admin]);

        assert_eq!(guard.authorize(&admin_only), Decision::Pending);
        store.set(None);
        assert_eq!(guard.authorize(&admin_only), Decision::RedirectToLogin);
        store.set(Some(SessionUser {
            subject: "root".to_string(),
            role: Role::Admin,
        }));
        assert_eq!(guard.authorize(&admin_only), Decision::Render);
    }

    #[tokio::test]
    async fn authorize_ready_never_pends() {
        let store = SessionStore::new();
        let guard = RouteGuard::new(store.clone());
        let writer = store.clone();

        let pending = tokio::spawn(async move { guard.authorize_ready(&RequiredRoles::any()).await });
        tokio::task::yield_now().await;
        writer.set(None);

        assert_eq!(
            pending.await.expect("guard task panicked"),
            Decision::RedirectToLogin
        );
    }
}
