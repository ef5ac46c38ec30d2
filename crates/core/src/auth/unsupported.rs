use async_trait::async_trait;
use authlab_domain::{AuthConfig, AuthLabError, AuthMode, AuthState, Result};
use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use super::AuthProvider;

/// Placeholder for modes without an implementation
#[derive(Debug)]
pub struct UnsupportedProvider {
    mode: AuthMode,
    state: watch::Sender<AuthState>,
}

impl UnsupportedProvider {
    pub fn new(mode: AuthMode) -> Self {
        let (state, _) = watch::channel(AuthState::anonymous());
        Self { mode, state }
    }

    fn not_implemented(&self) -> AuthLabError {
        AuthLabError::NotImplemented(self.mode.to_string())
    }
}

#[async_trait]
impl AuthProvider for UnsupportedProvider {
    fn mode(&self) -> AuthMode {
        self.mode
    }

    async fn init(&self, _config: &AuthConfig) -> AuthState {
        warn!(mode = %self.mode, "auth mode not implemented");
        let state = AuthState::failed(self.not_implemented().to_string());
        self.state.send_replace(state.clone());
        state
    }

    async fn login(&self) -> Result<()> {
        Err(self.not_implemented())
    }

    async fn logout(&self) -> Result<()> {
        self.local_logout(None);
        Ok(())
    }

    fn local_logout(&self, reason: Option<String>) {
        self.state.send_replace(reason.map_or_else(AuthState::anonymous, AuthState::failed));
    }

    fn access_token(&self) -> Option<String> {
        None
    }

    fn adopt_access_token(&self, _access: String) {}

    async fn validate_token(&self) -> Result<Value> {
        Err(self.not_implemented())
    }

    async fn fetch_rss(&self) -> Result<Value> {
        Err(self.not_implemented())
    }

    async fn admin_ping(&self) -> Result<Value> {
        Err(self.not_implemented())
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn shutdown(&self) {}
}
