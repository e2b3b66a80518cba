//! Session snapshot storage.
//!
//! The whole [`AppState`] is serialised as one JSON blob under a single key.
//! Storage sits behind [`KeyValueCache`] so tests and the demo can run
//! against memory while the CLI writes to the state directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::session::AppState;

/// Key under which the session snapshot is stored.
pub const STATE_KEY: &str = "claimdesk-app-state";

/// Minimal string key/value store.
pub trait KeyValueCache: Send {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// Stores each key as `<dir>/<key>.json`.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueCache for FileCache {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write to a sibling file first so a crash never leaves half a snapshot.
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueCache for MemoryCache {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Loads and stores the session snapshot.
///
/// Storage failures never reach the caller: a snapshot that cannot be read,
/// parsed or validated is treated as absent, and failed writes are logged.
pub struct PersistenceAdapter {
    cache: Box<dyn KeyValueCache>,
}

impl PersistenceAdapter {
    pub fn new(cache: Box<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCache::new()))
    }

    /// The stored snapshot, or the default state if there is none usable.
    pub fn restore(&self) -> AppState {
        match self.try_restore() {
            Ok(Some(state)) => {
                debug!(screen = %state.screen, "session restored");
                state
            }
            Ok(None) => AppState::default(),
            Err(e) => {
                warn!(error = %e, "discarding unusable session snapshot");
                AppState::default()
            }
        }
    }

    fn try_restore(&self) -> Result<Option<AppState>, PersistenceError> {
        let Some(blob) = self.cache.read(STATE_KEY)? else {
            return Ok(None);
        };
        let state: AppState = serde_json::from_str(&blob)?;
        state.validate().map_err(PersistenceError::Inconsistent)?;
        Ok(Some(state))
    }

    pub fn save(&mut self, state: &AppState) {
        let result = serde_json::to_string(state)
            .map_err(PersistenceError::from)
            .and_then(|blob| self.cache.write(STATE_KEY, &blob));
        if let Err(e) = result {
            warn!(error = %e, "failed to save session snapshot");
        }
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.cache.remove(STATE_KEY) {
            warn!(error = %e, "failed to clear session snapshot");
        }
    }
}
