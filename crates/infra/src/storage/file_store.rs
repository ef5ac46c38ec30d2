//! JSON-file key-value store
//!
//! The whole map is rewritten on every change: serialized into a temporary
//! file next to the target, synced, then renamed over it, so a crash leaves
//! either the old or the new map on disk. Reads come from an in-memory copy.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use authlab_common::storage::{KeyValueStore, StorageError, StorageResult};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// [`KeyValueStore`] persisted as one JSON object
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open `path`, loading it if present
    ///
    /// # Errors
    /// [`StorageError::Io`] if the file exists but cannot be read,
    /// [`StorageError::Corrupt`] if it is not a JSON string map.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|err| {
                    StorageError::Corrupt(format!("{}: {err}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), keys = entries.len(), "file store opened");
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut temp, entries)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| StorageError::Io(err.error))?;

        debug!(path = %self.path.display(), keys = entries.len(), "file store flushed");
        Ok(())
    }

    /// Apply `change` to a copy and commit it only once it is on disk
    fn update<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        change(&mut next);
        if next == *entries {
            return Ok(());
        }
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StorageResult<bool> {
        let mut entries = self.entries.write();
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        let mut next = entries.clone();
        match new {
            Some(value) => next.insert(key.to_string(), value.to_string()),
            None => next.remove(key),
        };
        if next != *entries {
            self.flush(&next)?;
            *entries = next;
        }
        Ok(true)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> StorageResult<()> {
        self.update(BTreeMap::clear)
    }
}
