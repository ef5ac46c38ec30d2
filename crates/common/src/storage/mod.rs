//! Key-value storage primitives
//!
//! Browser-style string stores: a synchronous [`KeyValueStore`] trait with
//! an atomic compare-and-swap, an in-memory implementation, and (with the
//! `runtime` feature) a change-notifying [`SharedStore`] that several tabs
//! observe through per-origin [`StoreView`]s.
//!
//! Writers always replace whole values; there is no partial update.

mod error;
mod memory;
#[cfg(feature = "runtime")]
mod shared;

use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
#[cfg(feature = "runtime")]
pub use shared::{SharedStore, StorageEvent, StorageEvents, StoreView};

/// A string-to-string store
///
/// Implementations must make each method atomic with respect to the others
/// on the same store. `compare_and_swap` is the only multi-step primitive
/// callers may rely on.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value; deleting a missing key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Replace `key` with `new` only if it currently holds `expected`
    ///
    /// `None` on either side means "absent". Returns whether the swap
    /// happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StorageResult<bool>;

    /// All keys currently present, in no particular order
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Remove every key
    fn clear(&self) -> StorageResult<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StorageResult<bool> {
        (**self).compare_and_swap(key, expected, new)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        (**self).keys()
    }

    fn clear(&self) -> StorageResult<()> {
        (**self).clear()
    }
}
