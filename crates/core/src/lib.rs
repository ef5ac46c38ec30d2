//! # AuthLab Core
//!
//! Session lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the token endpoint, resource API and location bar
//! - The in-process browser model (tabs, shared store, broadcast hub)
//! - Auth providers and the session manager that owns the active one
//! - Refresh coordination, request interception, idle and tab sync services
//!
//! ## Architecture Principles
//! - Depends on `authlab-common` and `authlab-domain` only
//! - No HTTP or filesystem code; adapters live in `authlab-infra`
//! - Every timer is a cancellable `ScheduledTask`

pub mod auth;
pub mod browser;
pub mod holder;
pub mod idle;
pub mod interceptor;
pub mod ports;
pub mod refresh;
mod report;
pub mod session;
pub mod storage;
pub mod sync;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::{create_provider, AuthProvider, PlainAuthProvider, ProviderContext, UnsupportedProvider};
pub use browser::{Browser, Tab};
pub use holder::TokenHolder;
pub use idle::IdleMonitor;
pub use interceptor::AuthInterceptor;
pub use ports::{HttpTransport, Navigator, TokenEndpoint};
pub use refresh::{RefreshCoordinator, RefreshListener};
pub use session::{SessionManager, SessionPorts};
pub use storage::{SessionKeys, StorageAdapter};
pub use sync::{Subscription, TabSyncBus};
