//! Session store for the bearer token issued by `POST /auth/login`.
//!
//! The token is kept exactly as received. Nothing here validates it or
//! enforces expiry; the API rejects stale tokens on later requests.
//!
//! Callers receive a `&dyn SessionStore` instead of reaching for a global so
//! tests can swap in [`MemorySessionStore`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::config;
use crate::config::schema::SessionConfig;

/// Durable key-value slot holding one bearer token.
pub trait SessionStore {
    /// Persist `token`, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;

    /// The stored token, or `None` when nothing usable is stored.
    fn read(&self) -> Option<String>;

    /// Forget the stored token. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Token persisted in a single file (default `~/.fintiva/session.token`).
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build the store from the `[session]` config section.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let path = config::expand_home(&config.path)
            .context("could not determine home directory for session file")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory {}", parent.display())
            })?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("failed to write session file {}", self.path.display()))
    }

    fn read(&self) -> Option<String> {
        let token = fs::read_to_string(&self.path).ok()?;
        if token.is_empty() { None } else { Some(token) }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove session file {}", self.path.display())),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Used by tests and by embedders that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, token: &str) -> Result<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn read(&self) -> Option<String> {
        self.slot().clone().filter(|t| !t.is_empty())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_token_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.token"));

        assert_eq!(store.read(), None);
        store.save("aaa.bbb.ccc\n").unwrap();
        assert_eq!(store.read().as_deref(), Some("aaa.bbb.ccc\n"));
    }

    #[test]
    fn file_store_save_replaces_previous_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.token"));
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.read().as_deref(), Some("second"));
    }

    #[test]
    fn file_store_treats_empty_file_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.token");
        fs::write(&path, "").unwrap();
        assert_eq!(FileSessionStore::new(path).read(), None);
    }

    #[test]
    fn file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.token"));
        store.save("t").unwrap();

        store.clear().unwrap();
        assert_eq!(store.read(), None);
        store.clear().unwrap();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn memory_store_clear_is_idempotent() {
        let store = MemorySessionStore::with_token("x.y.z");
        assert_eq!(store.read().as_deref(), Some("x.y.z"));
        store.clear().unwrap();
        assert_eq!(store.read(), None);
        store.clear().unwrap();
        assert_eq!(store.read(), None);
    }

    #[test]
    fn from_config_expands_home() {
        let store = FileSessionStore::from_config(&SessionConfig::default()).unwrap();
        assert!(store.path().ends_with(".fintiva/session.token"));
    }
}
