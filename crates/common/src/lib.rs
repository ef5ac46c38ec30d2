//! Modular common utilities shared across AuthLab crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: PKCE helpers, the JWT token codec, key-value stores, error
//!   classification
//! - `runtime`: clocks, cancellable scheduled tasks and the change-notifying
//!   shared store used for cross-tab coordination
//! - `observability`: tracing output from the runtime tier

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod jwt;
#[cfg(feature = "foundation")]
pub mod pkce;
#[cfg(feature = "foundation")]
pub mod storage;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use pkce::PkcePair;
#[cfg(feature = "foundation")]
pub use storage::{KeyValueStore, MemoryStore, StorageError};
#[cfg(feature = "runtime")]
pub use storage::{SharedStore, StorageEvent, StorageEvents, StoreView};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, ScheduledTask, SystemClock, TokioClock};
