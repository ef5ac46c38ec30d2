//! Cross-tab refresh lock
//!
//! The lock is the acquisition time (epoch ms) written under
//! `auth:refresh:lock` in the shared store. A value younger than the
//! staleness window means another tab is refreshing; anything older, or
//! unparseable, may be taken over. Acquisition is a compare-and-swap against
//! the value that was read, so two tabs reading the same stale value cannot
//! both win.

use authlab_common::storage::{KeyValueStore, StoreView};
use authlab_domain::constants::REFRESH_LOCK_KEY;
use authlab_domain::Result;
use tracing::{debug, warn};

/// Age of the current lock if it is still fresh
pub(crate) fn fresh_lock_age(raw: Option<&str>, now_ms: i64, stale_ms: u64) -> Option<i64> {
    let acquired_at: i64 = raw?.trim().parse().ok()?;
    let age = now_ms.saturating_sub(acquired_at);
    let stale = i64::try_from(stale_ms).unwrap_or(i64::MAX);
    (acquired_at > 0 && age < stale).then_some(age)
}

/// Held refresh lock; released when dropped
#[derive(Debug)]
pub(crate) struct RefreshLockGuard {
    store: StoreView,
    stamp: String,
}

impl RefreshLockGuard {
    /// Take the lock if it still holds `observed`
    pub(crate) fn acquire(store: &StoreView, observed: Option<&str>, now_ms: i64) -> Result<Option<Self>> {
        let stamp = now_ms.to_string();
        if store.compare_and_swap(REFRESH_LOCK_KEY, observed, Some(&stamp))? {
            debug!(tab_id = %store.origin(), "refresh lock acquired");
            Ok(Some(Self { store: store.clone(), stamp }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for RefreshLockGuard {
    fn drop(&mut self) {
        // Only clear our own stamp; a tab that took over a stale lock keeps it
        match self.store.compare_and_swap(REFRESH_LOCK_KEY, Some(&self.stamp), None) {
            Ok(true) => debug!(tab_id = %self.store.origin(), "refresh lock released"),
            Ok(false) => debug!(tab_id = %self.store.origin(), "refresh lock already replaced"),
            Err(err) => warn!(tab_id = %self.store.origin(), error = %err, "refresh lock release failed"),
        }
    }
}
