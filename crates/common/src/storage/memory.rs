//! In-memory store

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{KeyValueStore, StorageResult};

/// Process-local store backed by a `HashMap`
///
/// Stands in for both the in-memory token holder and the session-scoped
/// store of a tab.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
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
        match new {
            Some(value) => entries.insert(key.to_string(), value.to_string()),
            None => entries.remove(key),
        };
        Ok(true)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("token:news:news-web", "abc").unwrap();
        assert_eq!(store.get("token:news:news-web").unwrap().as_deref(), Some("abc"));

        store.set("token:news:news-web", "def").unwrap();
        assert_eq!(store.get("token:news:news-web").unwrap().as_deref(), Some("def"));

        store.remove("token:news:news-web").unwrap();
        store.remove("token:news:news-web").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn compare_and_swap_requires_expected_value() {
        let store = MemoryStore::new();

        assert!(store.compare_and_swap("lock", None, Some("1")).unwrap());
        assert!(!store.compare_and_swap("lock", None, Some("2")).unwrap());
        assert!(!store.compare_and_swap("lock", Some("9"), Some("2")).unwrap());
        assert!(store.compare_and_swap("lock", Some("1"), Some("2")).unwrap());
        assert_eq!(store.get("lock").unwrap().as_deref(), Some("2"));

        assert!(store.compare_and_swap("lock", Some("2"), None).unwrap());
        assert!(store.get("lock").unwrap().is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.len(), 2);

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
