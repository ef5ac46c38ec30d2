//! Change-notifying store shared between tabs
//!
//! A [`SharedStore`] wraps one backend (memory or file) and publishes a
//! [`StorageEvent`] for every write that changes a value. Each tab talks to
//! it through its own [`StoreView`]; the view stamps writes with the tab's
//! origin and its event stream hides the tab's own writes, which is how
//! browser `storage` events behave.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{KeyValueStore, MemoryStore, StorageResult};

const EVENT_CAPACITY: usize = 256;

/// One value change observed on the shared store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,
    /// Value before the write
    pub old_value: Option<String>,
    /// Value after the write; `None` for removals
    pub new_value: Option<String>,
    /// Origin (tab id) that performed the write
    pub origin: String,
}

struct Inner {
    backend: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StorageEvent>,
    // Serializes read-modify-notify so event old/new pairs are exact
    write_lock: Mutex<()>,
}

/// Backend plus change feed, cheap to clone
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("subscribers", &self.inner.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SharedStore {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { inner: Arc::new(Inner { backend, events, write_lock: Mutex::new(()) }) }
    }

    /// Shared store over a fresh [`MemoryStore`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// A view that writes as `origin`
    pub fn view(&self, origin: impl Into<String>) -> StoreView {
        StoreView { shared: self.clone(), origin: origin.into() }
    }

    /// Raw event feed including every origin
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    fn write(&self, origin: &str, key: &str, new_value: Option<&str>) -> StorageResult<()> {
        let _guard = self.inner.write_lock.lock();
        let old_value = self.inner.backend.get(key)?;
        match new_value {
            Some(value) => self.inner.backend.set(key, value)?,
            None => self.inner.backend.remove(key)?,
        }
        if old_value.as_deref() != new_value {
            self.publish(origin, key, old_value, new_value.map(str::to_string));
        }
        Ok(())
    }

    fn swap(
        &self,
        origin: &str,
        key: &str,
        expected: Option<&str>,
        new_value: Option<&str>,
    ) -> StorageResult<bool> {
        let _guard = self.inner.write_lock.lock();
        let swapped = self.inner.backend.compare_and_swap(key, expected, new_value)?;
        if swapped && expected != new_value {
            self.publish(
                origin,
                key,
                expected.map(str::to_string),
                new_value.map(str::to_string),
            );
        }
        Ok(swapped)
    }

    fn publish(
        &self,
        origin: &str,
        key: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let event = StorageEvent { key: key.to_string(), old_value, new_value, origin: origin.to_string() };
        // No receivers is normal before any tab subscribes
        let _ = self.inner.events.send(event);
    }
}

/// Per-origin handle on a [`SharedStore`]
#[derive(Debug, Clone)]
pub struct StoreView {
    shared: SharedStore,
    origin: String,
}

impl StoreView {
    /// Origin stamped on writes from this view
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The store this view writes to
    #[must_use]
    pub fn shared(&self) -> &SharedStore {
        &self.shared
    }

    /// Changes made by other origins
    #[must_use]
    pub fn foreign_events(&self) -> StorageEvents {
        StorageEvents { receiver: self.shared.subscribe(), origin: self.origin.clone() }
    }
}

impl KeyValueStore for StoreView {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.shared.inner.backend.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.shared.write(&self.origin, key, Some(value))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.shared.write(&self.origin, key, None)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StorageResult<bool> {
        self.shared.swap(&self.origin, key, expected, new)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.shared.inner.backend.keys()
    }
}

/// Event stream that skips the subscriber's own writes
#[derive(Debug)]
pub struct StorageEvents {
    receiver: broadcast::Receiver<StorageEvent>,
    origin: String,
}

impl StorageEvents {
    /// Next foreign change, or `None` once the store is gone
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.origin == self.origin => continue,
                Ok(event) => {
                    debug!(key = %event.key, from = %event.origin, "storage event");
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(origin = %self.origin, skipped, "storage event feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn foreign_events_skip_own_writes() {
        let shared = SharedStore::in_memory();
        let tab_a = shared.view("tab-a");
        let tab_b = shared.view("tab-b");
        let mut a_events = tab_a.foreign_events();

        tab_a.set("auth:bc", "own").unwrap();
        tab_b.set("auth:bc", "theirs").unwrap();

        let event = a_events.recv().await.unwrap();
        assert_eq!(event.origin, "tab-b");
        assert_eq!(event.old_value.as_deref(), Some("own"));
        assert_eq!(event.new_value.as_deref(), Some("theirs"));
    }

    #[tokio::test]
    async fn unchanged_writes_are_silent() {
        let shared = SharedStore::in_memory();
        let writer = shared.view("w");
        let mut raw = shared.subscribe();

        writer.set("k", "v").unwrap();
        writer.set("k", "v").unwrap();
        writer.remove("missing").unwrap();

        assert_eq!(raw.recv().await.unwrap().new_value.as_deref(), Some("v"));
        assert!(raw.try_recv().is_err());
    }

    #[test]
    fn views_share_one_backend() {
        let shared = SharedStore::in_memory();
        let a = shared.view("a");
        let b = shared.view("b");

        assert!(a.compare_and_swap("auth:refresh:lock", None, Some("100")).unwrap());
        assert!(!b.compare_and_swap("auth:refresh:lock", None, Some("101")).unwrap());
        assert_eq!(b.get("auth:refresh:lock").unwrap().as_deref(), Some("100"));
    }
}
