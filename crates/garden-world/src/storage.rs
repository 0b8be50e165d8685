//! String key-value persistence backends.

use garden_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the single-writer lock file inside a [`FileStore`] directory
pub const LOCK_FILE: &str = "garden.lock";

/// Keys written by the engine and the placement ledger
pub mod keys {
    pub const GRID_STATE: &str = "garden_grid_state";
    pub const SIMULATION_LAST_RUN: &str = "garden_simulation_last_run";
    pub const START_TIME: &str = "garden_start_time";
    pub const LAST_PLACEMENT: &str = "garden_last_placement";

    pub const ALL: [&str; 4] = [GRID_STATE, SIMULATION_LAST_RUN, START_TIME, LAST_PLACEMENT];
}

/// Opaque string store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Claim the directory for this process. Every process that loads and
    /// saves the garden must hold the lock, so only one engine writes the
    /// snapshot at a time. Released when the returned guard drops.
    pub fn lock(&self) -> Result<StoreLock> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(LOCK_FILE);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                debug!(path = %path.display(), "Acquired store lock");
                Ok(StoreLock { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                Err(Error::InvalidState(format!(
                    "garden data in {} is in use by process {}; remove {} if that process is gone",
                    self.dir.display(),
                    holder.trim(),
                    path.display()
                )))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::Persistence(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

/// Held claim on a [`FileStore`] directory
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Write then rename so readers never see a torn value
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_shared_between_clones() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("a", "1").unwrap();
        assert_eq!(other.get("a").unwrap(), Some("1".to_string()));
        other.remove("a").unwrap();
        assert!(store.is_empty());
        // Removing an absent key is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get(keys::GRID_STATE).unwrap(), None);
        store.set(keys::GRID_STATE, "{\"size\":1}").unwrap();
        assert_eq!(
            store.get(keys::GRID_STATE).unwrap().as_deref(),
            Some("{\"size\":1}")
        );

        store.set(keys::GRID_STATE, "{}").unwrap();
        assert_eq!(store.get(keys::GRID_STATE).unwrap().as_deref(), Some("{}"));

        store.remove(keys::GRID_STATE).unwrap();
        assert_eq!(store.get(keys::GRID_STATE).unwrap(), None);
        store.remove(keys::GRID_STATE).unwrap();
    }

    #[test]
    fn test_lock_admits_one_holder() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("garden"));
        let other = FileStore::new(dir.path().join("garden"));

        let lock = store.lock().unwrap();
        assert!(lock.path().exists());
        let holder = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());

        assert!(matches!(other.lock(), Err(Error::InvalidState(_))));

        drop(lock);
        assert!(!dir.path().join("garden").join(LOCK_FILE).exists());
        let relocked = other.lock().unwrap();
        drop(relocked);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(Error::Persistence(_))
        ));
    }
}
