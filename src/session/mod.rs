//! Client-side session core: credential decoding, persistence, the shared
//! session state, its lifecycle, and the render gate for protected views.
//!
//! Flow Overview: at startup `SessionLifecycle::bootstrap` reads the stored
//! credential, decodes it and resolves the `SessionStore`. Protected views ask
//! the `RouteGuard` on every render. The login form hands the credential and
//! role from the API to `login`; sign-out calls `logout`.
//!
//! Claims are decoded without verifying the signature. They drive UX only;
//! the API authorizes every request. Never log credential material.

pub mod clock;
pub mod guard;
pub mod lifecycle;
pub mod role;
pub mod routes;
pub mod state;
pub mod storage;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use guard::{decide, Decision, RequiredRoles, RouteGuard};
pub use lifecycle::{
    BootstrapOutcome, BootstrapTask, EvictionReason, LoginGrant, SessionError, SessionLifecycle,
};
pub use role::Role;
pub use routes::{nav_links, NavAction, NavLink, RouteTable};
pub use state::{Session, SessionStore, SessionUser};
pub use storage::{CredentialStore, FileStore, MemoryStore, PersistedCredential, StoreError};
pub use token::{decode, Claims, Credential, DecodeError};
