//! Authentication providers
//!
//! One provider is active per tab, selected by [`AuthMode`]. `plain` carries
//! the full PKCE flow; the other modes are placeholders that report
//! themselves as not implemented.

mod plain;
mod unsupported;

use std::sync::Arc;

use async_trait::async_trait;
use authlab_domain::{
    ApiConfig, AuthConfig, AuthMode, AuthState, PkceDebugInfo, Result, SessionConfig,
};
use serde_json::Value;
use tokio::sync::watch;

pub use self::plain::PlainAuthProvider;
pub use self::unsupported::UnsupportedProvider;
use crate::holder::TokenHolder;
use crate::ports::{HttpTransport, Navigator, TokenEndpoint};
use crate::storage::StorageAdapter;

/// Resource paths on the API gateway
pub const VALIDATE_PATH: &str = "/api/token/validate";
pub const RSS_PATH: &str = "/api/rss";
pub const ADMIN_PING_PATH: &str = "/api/admin/ping";

/// Login, logout and session state for one auth mode
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn mode(&self) -> AuthMode;

    /// Resume from storage or finish a pending authorization-code redirect
    async fn init(&self, config: &AuthConfig) -> AuthState;

    /// Start an authorization round-trip (navigates away)
    async fn login(&self) -> Result<()>;

    /// Clear the session everywhere in this tab and end it at the issuer
    async fn logout(&self) -> Result<()>;

    /// Clear the session without redirecting, e.g. on another tab's logout
    fn local_logout(&self, reason: Option<String>);

    fn access_token(&self) -> Option<String>;

    /// Take over an access token refreshed elsewhere
    fn adopt_access_token(&self, access: String);

    /// `GET /api/token/validate`
    async fn validate_token(&self) -> Result<Value>;

    /// `GET /api/rss`
    async fn fetch_rss(&self) -> Result<Value>;

    /// `GET /api/admin/ping`
    async fn admin_ping(&self) -> Result<Value>;

    fn subscribe(&self) -> watch::Receiver<AuthState>;

    fn state(&self) -> AuthState;

    fn supports_debug_info(&self) -> bool {
        false
    }

    fn debug_info(&self) -> Option<PkceDebugInfo> {
        None
    }

    /// Identity provider account console
    fn account_url(&self) -> Option<String> {
        None
    }

    /// Stop timers; the provider is being replaced
    fn shutdown(&self);
}

/// Everything a provider needs from its tab
#[derive(Clone)]
pub struct ProviderContext {
    pub storage: StorageAdapter,
    pub endpoint: Arc<dyn TokenEndpoint>,
    pub transport: Arc<dyn HttpTransport>,
    pub navigator: Arc<dyn Navigator>,
    pub holder: TokenHolder,
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
}

/// Build the provider for `mode`
pub fn create_provider(mode: AuthMode, ctx: ProviderContext) -> Arc<dyn AuthProvider> {
    if mode.is_implemented() {
        Arc::new(PlainAuthProvider::new(ctx))
    } else {
        Arc::new(UnsupportedProvider::new(mode))
    }
}
