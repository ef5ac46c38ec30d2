//! Configuration management
//!
//! Defaults reproduce the lab deployment (Keycloak on `localhost:8443`, realm
//! `news`, public client `news-web`). Every section deserializes with
//! `#[serde(default)]` so partial TOML/JSON files only override what they
//! name.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALLOWLIST, DEFAULT_CLIENT_ID, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_IDLE_WARNING_SECS,
    DEFAULT_KC_BASE, DEFAULT_REALM, DEFAULT_REDIRECT_URI, DEFAULT_SCOPE, EXPIRY_POLL_MS,
    REFRESH_LOCK_STALE_MS, REFRESH_POLL_MS, REFRESH_WAIT_MS, TAB_SYNC_CHANNEL,
    TAB_SYNC_RECENT_CAPACITY,
};
use crate::errors::{AuthLabError, Result};
use crate::types::{AuthMode, StorageStrategy};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub idle: IdleConfig,
    pub tab_sync: TabSyncConfig,
}

impl Config {
    /// Check cross-field constraints
    ///
    /// # Errors
    /// [`AuthLabError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.auth.realm.trim().is_empty() {
            return Err(AuthLabError::Config("auth.realm must not be empty".into()));
        }
        if self.auth.client_id.trim().is_empty() {
            return Err(AuthLabError::Config("auth.client_id must not be empty".into()));
        }
        if !self.auth.kc_base.starts_with("http://") && !self.auth.kc_base.starts_with("https://") {
            return Err(AuthLabError::Config(format!(
                "auth.kc_base must be an http(s) URL, got {}",
                self.auth.kc_base
            )));
        }
        if self.session.refresh_poll_ms == 0 || self.session.expiry_poll_ms == 0 {
            return Err(AuthLabError::Config("poll intervals must be positive".into()));
        }
        if self.idle.warning_secs > self.idle.timeout_secs {
            return Err(AuthLabError::Config(
                "idle.warning_secs must not exceed idle.timeout_secs".into(),
            ));
        }
        if self.tab_sync.recent_capacity == 0 {
            return Err(AuthLabError::Config("tab_sync.recent_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Identity provider settings and endpoint derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Keycloak base URL without trailing slash
    pub kc_base: String,
    pub realm: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            kc_base: DEFAULT_KC_BASE.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl AuthConfig {
    /// `{kc_base}/realms/{realm}`
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.kc_base.trim_end_matches('/'), self.realm)
    }

    /// Authorization endpoint
    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.issuer())
    }

    /// Token endpoint
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.issuer())
    }

    /// End-session endpoint (without query)
    #[must_use]
    pub fn end_session_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.issuer())
    }

    /// Account console
    #[must_use]
    pub fn account_url(&self) -> String {
        format!("{}/account", self.issuer())
    }
}

/// Resource API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix for resource calls; empty means same origin
    pub base_url: String,
    /// Regex patterns; a request URL matching any gets a bearer token
    pub allowlist: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            allowlist: DEFAULT_ALLOWLIST.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl ApiConfig {
    /// Join the base URL and a path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Provider used when nothing is persisted
    pub mode: AuthMode,
    /// Backend used when nothing is persisted
    pub storage_strategy: StorageStrategy,
    pub expiry_poll_ms: u64,
    pub refresh_lock_stale_ms: u64,
    pub refresh_wait_ms: u64,
    pub refresh_poll_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            storage_strategy: StorageStrategy::default(),
            expiry_poll_ms: EXPIRY_POLL_MS,
            refresh_lock_stale_ms: REFRESH_LOCK_STALE_MS,
            refresh_wait_ms: REFRESH_WAIT_MS,
            refresh_poll_ms: REFRESH_POLL_MS,
        }
    }
}

impl SessionConfig {
    pub fn expiry_poll(&self) -> Duration {
        Duration::from_millis(self.expiry_poll_ms)
    }

    pub fn refresh_wait(&self) -> Duration {
        Duration::from_millis(self.refresh_wait_ms)
    }

    pub fn refresh_poll(&self) -> Duration {
        Duration::from_millis(self.refresh_poll_ms)
    }
}

/// Idle monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Remaining seconds at which the monitor enters `warning`
    pub warning_secs: u64,
    /// Log out (and broadcast) when the countdown reaches zero
    pub auto_logout: bool,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            warning_secs: DEFAULT_IDLE_WARNING_SECS,
            auto_logout: true,
        }
    }
}

/// Tab sync bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabSyncConfig {
    pub channel: String,
    pub recent_capacity: usize,
}

impl Default for TabSyncConfig {
    fn default() -> Self {
        Self { channel: TAB_SYNC_CHANNEL.to_string(), recent_capacity: TAB_SYNC_RECENT_CAPACITY }
    }
}
