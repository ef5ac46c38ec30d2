//! Wall-clock sources

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync + Debug {
    /// Current epoch time in milliseconds
    fn now_millis(&self) -> i64;

    /// Current epoch time in whole seconds
    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// Real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wall clock that advances with tokio's clock
///
/// Anchored to the real time at construction, then driven by
/// `tokio::time::Instant`, so `tokio::time::pause`/`advance` move it too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_millis: i64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor at the current wall-clock time
    #[must_use]
    pub fn new() -> Self {
        Self::anchored_at(Utc::now().timestamp_millis())
    }

    /// Anchor at a chosen epoch time
    #[must_use]
    pub fn anchored_at(epoch_millis: i64) -> Self {
        Self { anchor_millis: epoch_millis, anchor: tokio::time::Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_millis.saturating_add(elapsed)
    }
}

/// Manually driven clock for tests
#[derive(Debug, Default)]
pub struct MockClock {
    millis: AtomicI64,
}

impl MockClock {
    /// Start at `epoch_millis`
    #[must_use]
    pub fn new(epoch_millis: i64) -> Self {
        Self { millis: AtomicI64::new(epoch_millis) }
    }

    /// Jump to an absolute time
    pub fn set_millis(&self, epoch_millis: i64) {
        self.millis.store(epoch_millis, Ordering::SeqCst);
    }

    /// Move forward
    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Move forward by whole seconds
    pub fn advance_secs(&self, delta: i64) {
        self.advance_millis(delta * 1000);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
