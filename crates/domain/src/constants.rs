//! Domain constants
//!
//! Storage key names, deployment defaults and coordination timings shared by
//! every tab.

// Deployment defaults
pub const DEFAULT_REALM: &str = "news";
pub const DEFAULT_CLIENT_ID: &str = "news-web";
pub const DEFAULT_KC_BASE: &str = "https://localhost:8443";
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost/";
pub const DEFAULT_SCOPE: &str = "openid profile email";

// Default interceptor allow-list
pub const DEFAULT_ALLOWLIST: [&str; 2] = ["^/api/", "^https://localhost/api/"];

// Singleton storage keys (shared persistent store)
pub const AUTH_MODE_KEY: &str = "authMode";
pub const STORAGE_STRATEGY_KEY: &str = "storage:strategy";
pub const REFRESH_LOCK_KEY: &str = "auth:refresh:lock";
pub const TAB_SYNC_STORAGE_KEY: &str = "auth:bc";

// Per-session key prefixes, completed with `{realm}:{clientId}`
pub const PKCE_KEY_PREFIX: &str = "pkce";
pub const TOKEN_KEY_PREFIX: &str = "token";
pub const REFRESH_KEY_PREFIX: &str = "refresh";

// Tab sync
pub const TAB_SYNC_CHANNEL: &str = "auth";
pub const TAB_SYNC_RECENT_CAPACITY: usize = 20;

// Refresh coordination
pub const REFRESH_LOCK_STALE_MS: u64 = 10_000;
pub const REFRESH_WAIT_MS: u64 = 5_000;
pub const REFRESH_POLL_MS: u64 = 250;

// Watchers
pub const EXPIRY_POLL_MS: u64 = 1_000;
pub const IDLE_TICK_MS: u64 = 1_000;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_IDLE_WARNING_SECS: u64 = 60;

// User-facing messages
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired — please login again.";
pub const MISSING_VERIFIER_MESSAGE: &str = "Missing PKCE verifier";
pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated";
