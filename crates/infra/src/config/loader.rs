//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required ones are missing, falls back to a config file
//! 3. Probes multiple paths for config files
//! 4. With no file anywhere, uses the built-in lab defaults
//!
//! Every successful load is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `AUTHLAB_KC_BASE`: Keycloak base URL
//! - `AUTHLAB_REALM`: Realm name
//! - `AUTHLAB_CLIENT_ID`: Public client id
//!
//! Optional (defaults otherwise):
//! - `AUTHLAB_REDIRECT_URI`, `AUTHLAB_SCOPE`
//! - `AUTHLAB_API_BASE`: Prefix for resource calls
//! - `AUTHLAB_API_ALLOWLIST`: Comma-separated URL regexes
//! - `AUTHLAB_AUTH_MODE`: `plain`, `oidc-client-ts`, ...
//! - `AUTHLAB_STORAGE_STRATEGY`: `memory`, `session` or `local`
//! - `AUTHLAB_IDLE_ENABLED`, `AUTHLAB_IDLE_AUTO_LOGOUT` (true/false)
//! - `AUTHLAB_IDLE_TIMEOUT_SECS`, `AUTHLAB_IDLE_WARNING_SECS`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./authlab.json` or `./authlab.toml` (current working directory)
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use authlab_domain::{AuthLabError, Config, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `AuthLabError::Config` if a config file exists but is invalid,
/// or if the resulting configuration fails validation.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path)),
                None => {
                    tracing::info!("No config file found, using defaults");
                    let config = Config::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }
}

/// Load configuration from environment variables
///
/// The three identity variables are required; everything else overrides
/// a default only when set.
///
/// # Errors
/// Returns `AuthLabError::Config` if required variables are missing
/// or any variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.auth.kc_base = env_var("AUTHLAB_KC_BASE")?;
    config.auth.realm = env_var("AUTHLAB_REALM")?;
    config.auth.client_id = env_var("AUTHLAB_CLIENT_ID")?;

    if let Some(redirect_uri) = env_opt("AUTHLAB_REDIRECT_URI") {
        config.auth.redirect_uri = redirect_uri;
    }
    if let Some(scope) = env_opt("AUTHLAB_SCOPE") {
        config.auth.scope = scope;
    }
    if let Some(base_url) = env_opt("AUTHLAB_API_BASE") {
        config.api.base_url = base_url;
    }
    if let Some(allowlist) = env_opt("AUTHLAB_API_ALLOWLIST") {
        config.api.allowlist = allowlist
            .split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(mode) = env_parse("AUTHLAB_AUTH_MODE")? {
        config.session.mode = mode;
    }
    if let Some(strategy) = env_parse("AUTHLAB_STORAGE_STRATEGY")? {
        config.session.storage_strategy = strategy;
    }

    config.idle.enabled = env_bool("AUTHLAB_IDLE_ENABLED", config.idle.enabled);
    config.idle.auto_logout = env_bool("AUTHLAB_IDLE_AUTO_LOGOUT", config.idle.auto_logout);
    if let Some(timeout) = env_parse("AUTHLAB_IDLE_TIMEOUT_SECS")? {
        config.idle.timeout_secs = timeout;
    }
    if let Some(warning) = env_parse("AUTHLAB_IDLE_WARNING_SECS")? {
        config.idle.warning_secs = warning;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Sections and fields missing from the file keep their defaults.
///
/// # Errors
/// Returns `AuthLabError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The parsed configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthLabError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthLabError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuthLabError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthLabError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthLabError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(AuthLabError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> [PathBuf; 4] {
    [
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("authlab.json"),
        dir.join("authlab.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `AuthLabError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        AuthLabError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Optional environment variable; empty counts as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an optional environment variable with `FromStr`
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| AuthLabError::Config(format!("Invalid value for {}: {}", key, e)))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
