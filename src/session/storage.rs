//! Durable persistence for the raw credential and the role hint set at login.
//!
//! Two slots live under fixed keys: `token` and `role`. They are written and
//! cleared together; a store never leaves one written without the other. No
//! validation happens at this layer.

use crate::session::token::Credential;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument, warn};

/// Key of the raw credential slot.
pub const CREDENTIAL_KEY: &str = "token";
/// Key of the role hint slot.
pub const ROLE_KEY: &str = "role";
/// File name used by [`FileStore`] inside the profile directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Clone, Debug)]
pub struct PersistedCredential {
    pub credential: Credential,
    /// Role string stored at login; absent when only the credential slot exists.
    pub role_hint: Option<String>,
}

impl PersistedCredential {
    pub fn new(credential: Credential, role_hint: impl Into<String>) -> Self {
        Self {
            credential,
            role_hint: Some(role_hint.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential store at {path} is corrupt: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value persistence for the credential pair.
///
/// Methods are async so file or browser backed stores can suspend; callers
/// await each call before the next dependent step.
pub trait CredentialStore: Send + Sync {
    /// Writes both slots.
    fn write(
        &self,
        entry: &PersistedCredential,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns `None` when no credential is stored.
    fn read(&self) -> impl Future<Output = Result<Option<PersistedCredential>, StoreError>> + Send;

    /// Removes both slots. Clearing an empty store succeeds.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process store, mainly for tests and embedding hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<&'static str, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw slot value, bypassing the credential pairing.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots
            .lock()
            .ok()
            .and_then(|slots| slots.get(key).cloned())
    }

    /// Sets a single raw slot. Lets tests reproduce profiles written by older clients.
    pub fn put(&self, key: &'static str, value: impl Into<String>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key, value.into());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().map_or(true, |slots| slots.is_empty())
    }

    /// Makes every following operation fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, String>>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("storage disabled".to_string()));
        }
        self.slots
            .lock()
            .map_err(|_| StoreError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryStore {
    async fn write(&self, entry: &PersistedCredential) -> Result<(), StoreError> {
        let mut slots = self.slots()?;
        slots.insert(CREDENTIAL_KEY, entry.credential.expose().to_string());
        match &entry.role_hint {
            Some(role) => slots.insert(ROLE_KEY, role.clone()),
            None => slots.remove(ROLE_KEY),
        };
        Ok(())
    }

    async fn read(&self) -> Result<Option<PersistedCredential>, StoreError> {
        let slots = self.slots()?;
        Ok(slots.get(CREDENTIAL_KEY).map(|token| PersistedCredential {
            credential: Credential::new(token.as_str()),
            role_hint: slots.get(ROLE_KEY).cloned(),
        }))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut slots = self.slots()?;
        slots.remove(CREDENTIAL_KEY);
        slots.remove(ROLE_KEY);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Store backed by one JSON document in a profile directory.
///
/// Writes land in a sibling temp file that is renamed into place, so both
/// slots change together.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Writes `bytes` to `tmp` and renames it over `path`.
    async fn replace(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(tmp)
            .await
            .map_err(|e| Self::io_error(tmp, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| Self::io_error(tmp, e))?;
        file.sync_all().await.map_err(|e| Self::io_error(tmp, e))?;
        drop(file);

        fs::rename(tmp, path)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl CredentialStore for FileStore {
    #[instrument(skip(self, entry), fields(path = %self.path().display()))]
    async fn write(&self, entry: &PersistedCredential) -> Result<(), StoreError> {
        let path = self.path();
        let tmp = self.dir.join(format!("{CREDENTIALS_FILE}.tmp"));

        let document = Document {
            token: Some(entry.credential.expose().to_string()),
            role: entry.role_hint.clone(),
        };
        let bytes = serde_json::to_vec(&document).map_err(|source| StoreError::Format {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        if let Err(err) = Self::replace(&tmp, &path, &bytes).await {
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("failed to remove {}: {e}", tmp.display());
                }
            }
            return Err(err);
        }

        debug!("credential written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path().display()))]
    async fn read(&self) -> Result<Option<PersistedCredential>, StoreError> {
        let path = self.path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no stored credential");
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        let document: Document =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Format {
                path: path.clone(),
                source,
            })?;

        Ok(document.token.map(|token| PersistedCredential {
            credential: Credential::new(token),
            role_hint: document.role,
        }))
    }

    #[instrument(skip(self), fields(path = %self.path().display()))]
    async fn clear(&self) -> Result<(), StoreError> {
        let path = self.path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("credential cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}
