use crate::{
    cli::globals::GlobalArgs,
    session::{
        guard::LOGIN_PATH, nav_links, token::Credential, FileStore, Role, RouteGuard, RouteTable,
        SessionLifecycle, SessionStore, GIT_COMMIT_HASH,
    },
};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct LoginArgs {
    pub globals: GlobalArgs,
    pub credential: Credential,
    pub role: Role,
}

#[derive(Debug)]
pub struct AuthorizeArgs {
    pub globals: GlobalArgs,
    pub path: String,
}

type Lifecycle = SessionLifecycle<FileStore>;

fn lifecycle(globals: &GlobalArgs) -> Arc<Lifecycle> {
    Arc::new(SessionLifecycle::new(
        FileStore::new(&globals.profile_dir),
        SessionStore::new(),
    ))
}

async fn restore(globals: &GlobalArgs) -> Result<Arc<Lifecycle>> {
    let lifecycle = lifecycle(globals);
    let outcome = lifecycle
        .spawn_bootstrap()
        .wait()
        .await
        .context("Could not restore the stored session")?;
    debug!(?outcome, "bootstrap finished");
    Ok(lifecycle)
}

pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Restore the session and print it along with the navigation it unlocks.
/// # Errors
/// Returns an error if the profile cannot be read.
pub async fn status(globals: GlobalArgs) -> Result<()> {
    let lifecycle = restore(&globals).await?;
    let session = lifecycle.session().get();

    print_json(&json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "build": GIT_COMMIT_HASH,
        "session": session,
        "nav": nav_links(&session),
    }))
}

/// Store the credential and sign in.
/// # Errors
/// Returns an error if the credential is malformed or cannot be stored.
pub async fn login(args: LoginArgs) -> Result<()> {
    // A stored profile that fails to restore is overwritten by the login.
    let lifecycle = lifecycle(&args.globals);
    let user = lifecycle
        .login(args.credential, args.role)
        .await
        .context("Login failed")?;
    info!(role = %user.role, "credential stored");

    print_json(&json!({
        "session": lifecycle.session().get(),
        "redirect": user.role.home_path(),
    }))
}

/// Clear the stored credential.
/// # Errors
/// Returns an error if the profile cannot be cleared.
pub async fn logout(globals: GlobalArgs) -> Result<()> {
    let lifecycle = lifecycle(&globals);
    lifecycle.logout().await.context("Logout failed")?;

    print_json(&json!({
        "session": lifecycle.session().get(),
        "redirect": LOGIN_PATH,
    }))
}

/// Decide whether `path` may render for the stored session.
/// # Errors
/// Returns an error if the profile cannot be read.
pub async fn authorize(args: AuthorizeArgs) -> Result<()> {
    let lifecycle = restore(&args.globals).await?;
    let guard = RouteGuard::new(lifecycle.session().clone());
    let table = RouteTable::portal();

    let decision = table.resolve(&args.path, &guard);
    debug!(path = %args.path, ?decision, "route resolved");

    print_json(&json!({
        "path": args.path,
        "protected": table.required_roles(&args.path).is_some(),
        "decision": decision,
        "redirect": decision.redirect_path(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        clock::{Clock, SystemClock},
        token::{encode_unsigned, Claims},
        CredentialStore,
    };

    #[tokio::test]
    async fn login_overwrites_corrupt_profile() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path());
        std::fs::write(store.path(), b"{ not json")?;

        let token = encode_unsigned(&Claims {
            subject: "alice".to_string(),
            role: Role::Mentor,
            expiry: SystemClock.now() + 3600,
        });
        login(LoginArgs {
            globals: GlobalArgs::new(dir.path()),
            credential: Credential::new(token.as_str()),
            role: Role::Mentor,
        })
        .await?;

        let stored = store.read().await?.context("credential stored")?;
        assert_eq!(stored.credential.expose(), token);
        assert_eq!(stored.role_hint.as_deref(), Some("MENTOR"));
        Ok(())
    }

    #[tokio::test]
    async fn status_reports_corrupt_profile() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(FileStore::new(dir.path()).path(), b"{ not json")?;

        assert!(status(GlobalArgs::new(dir.path())).await.is_err());
        Ok(())
    }
}
