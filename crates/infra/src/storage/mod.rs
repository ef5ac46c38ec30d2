//! Persistent storage adapters

mod file_store;

use std::path::Path;
use std::sync::Arc;

use authlab_common::storage::StorageResult;
use authlab_common::time::SystemClock;
use authlab_core::Browser;

pub use file_store::FileStore;

/// A browser whose shared persistent store lives in a JSON file
///
/// Tokens written under the `local` strategy survive process restarts;
/// memory and session stores stay per tab.
///
/// # Errors
/// Fails when an existing file cannot be read or parsed.
pub fn browser_with_file_store(path: impl AsRef<Path>) -> StorageResult<Browser> {
    let store = FileStore::open(path)?;
    Ok(Browser::with_parts(Arc::new(store), Arc::new(SystemClock)))
}
