//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use authlab_domain::{AuthLabError, AuthMode, StorageStrategy};
use authlab_infra::config;
use tempfile::NamedTempFile;

/// Write `content` to a temp file carrying `extension`
fn config_file(content: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "auth": {
            "kc_base": "https://kc.example:8443",
            "realm": "lab",
            "client_id": "lab-web",
            "redirect_uri": "https://app.example/"
        },
        "api": {
            "base_url": "https://app.example",
            "allowlist": ["^https://app\\.example/api/"]
        },
        "session": {
            "mode": "plain",
            "storage_strategy": "memory",
            "refresh_wait_ms": 2000
        },
        "idle": {
            "enabled": true,
            "timeout_secs": 120,
            "warning_secs": 30,
            "auto_logout": false
        }
    }"#;
    let path = config_file(json_content, "json");

    let config = config::load_from_file(Some(path.clone())).expect("config from JSON");

    assert_eq!(config.auth.issuer(), "https://kc.example:8443/realms/lab");
    assert_eq!(config.auth.client_id, "lab-web");
    assert_eq!(config.auth.redirect_uri, "https://app.example/");
    assert_eq!(config.api.url("/api/rss"), "https://app.example/api/rss");
    assert_eq!(config.api.allowlist, vec!["^https://app\\.example/api/"]);
    assert_eq!(config.session.mode, AuthMode::Plain);
    assert_eq!(config.session.storage_strategy, StorageStrategy::Memory);
    assert_eq!(config.session.refresh_wait_ms, 2000);
    // Unset fields keep their defaults
    assert_eq!(config.session.refresh_lock_stale_ms, 10_000);
    assert!(config.idle.enabled);
    assert!(!config.idle.auto_logout);
    assert_eq!(config.idle.timeout_secs, 120);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[auth]
realm = "news"
client_id = "news-web"

[session]
mode = "oidc-client-ts"
storage_strategy = "local"

[tab_sync]
channel = "auth-lab"
recent_capacity = 5
"#;
    let path = config_file(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("config from TOML");

    assert_eq!(config.auth.kc_base, "https://localhost:8443");
    assert_eq!(config.session.mode, AuthMode::OidcClientTs);
    assert_eq!(config.session.storage_strategy, StorageStrategy::Persistent);
    assert_eq!(config.tab_sync.channel, "auth-lab");
    assert_eq!(config.tab_sync.recent_capacity, 5);
    assert!(!config.idle.enabled);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_empty_object_uses_defaults() {
    let path = config_file("{}", "json");

    let config = config::load_from_file(Some(path.clone())).expect("config from empty JSON");
    assert_eq!(config, authlab_domain::Config::default());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/config.json".into()));

    match result {
        Err(AuthLabError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let path = config_file(r#"{ "this is": "not valid" "#, "json");

    match config::load_from_file(Some(path.clone())) {
        Err(AuthLabError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_failing_validation() {
    let path = config_file(r#"{"idle": {"timeout_secs": 10, "warning_secs": 60}}"#, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(AuthLabError::Config(_))), "got {result:?}");

    std::fs::remove_file(path).ok();
}
