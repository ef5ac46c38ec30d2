//! File-backed persistent store under the session layer.

use std::sync::Arc;
use std::time::Duration;

use authlab_common::storage::KeyValueStore;
use authlab_common::time::Clock;
use authlab_core::testing::{access_token, MockHttpTransport, MockTokenEndpoint, RecordingNavigator};
use authlab_core::{Browser, SessionKeys, SessionManager, SessionPorts};
use authlab_domain::constants::AUTH_MODE_KEY;
use authlab_domain::{AuthMode, Config, StorageStrategy, TokenKind};
use authlab_infra::{browser_with_file_store, FileStore};
use tempfile::TempDir;

fn persistent_config() -> Config {
    let mut config = Config::default();
    config.session.storage_strategy = StorageStrategy::Persistent;
    config
}

fn manager(browser: &Browser, endpoint: Arc<MockTokenEndpoint>) -> SessionManager {
    let ports = SessionPorts {
        endpoint,
        transport: Arc::new(MockHttpTransport::new()),
        navigator: Arc::new(RecordingNavigator::new("https://localhost/")),
    };
    SessionManager::new(browser.open_tab(), persistent_config(), ports).expect("session manager")
}

#[test]
fn values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local-storage.json");

    let store = FileStore::open(&path).unwrap();
    store.set("token:news:news-web", "a1").unwrap();
    store.set(AUTH_MODE_KEY, "plain").unwrap();
    store.remove(AUTH_MODE_KEY).unwrap();
    drop(store);

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get("token:news:news-web").unwrap().as_deref(), Some("a1"));
    assert_eq!(reopened.get(AUTH_MODE_KEY).unwrap(), None);
}

/// Validates that the `local` strategy outlives the process.
///
/// Assertions:
/// - Tokens and the selected mode written by one run are restored by the next.
#[tokio::test]
async fn persistent_session_is_restored_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local-storage.json");
    let keys = SessionKeys::from_config(&persistent_config().auth);

    let browser = browser_with_file_store(&path).unwrap();
    let access = access_token("alice", Some(browser.clock().now_secs() + 300));
    {
        let session = manager(&browser, Arc::new(MockTokenEndpoint::new()));
        session.storage().write(&keys, TokenKind::AccessToken, &access).unwrap();
        session.storage().write(&keys, TokenKind::RefreshToken, "r1").unwrap();
        session.switch_mode(AuthMode::Plain).await.unwrap();
        session.shutdown();
    }
    drop(browser);

    let restarted = browser_with_file_store(&path).unwrap();
    let session = manager(&restarted, Arc::new(MockTokenEndpoint::new()));
    let state = session.init().await;

    assert!(state.logged_in);
    assert_eq!(state.access_token.as_deref(), Some(access.as_str()));
    assert_eq!(session.mode(), AuthMode::Plain);
    assert_eq!(session.storage().read(&keys, TokenKind::RefreshToken).unwrap().as_deref(), Some("r1"));
    session.shutdown();
}

/// Validates the cross-tab refresh lock on a file-backed store.
///
/// Assertions:
/// - Two tabs refreshing together produce one grant.
/// - The waiting tab picks up the token the other tab wrote.
#[tokio::test]
async fn tabs_share_one_refresh_through_file_lock() {
    let dir = TempDir::new().unwrap();
    let browser = browser_with_file_store(dir.path().join("local-storage.json")).unwrap();
    let keys = SessionKeys::from_config(&persistent_config().auth);

    let endpoint = Arc::new(MockTokenEndpoint::new().with_latency(Duration::from_millis(100)));
    endpoint.push_tokens("a2", Some("r2"));

    let first = manager(&browser, endpoint.clone());
    let second = manager(&browser, endpoint.clone());
    first.storage().write(&keys, TokenKind::AccessToken, "a1").unwrap();
    first.storage().write(&keys, TokenKind::RefreshToken, "r1").unwrap();

    let (a, b) = tokio::join!(first.refresh(), second.refresh());

    assert_eq!(a.as_deref(), Some("a2"));
    assert_eq!(b.as_deref(), Some("a2"));
    assert_eq!(endpoint.refresh_calls(), 1);
    assert_eq!(second.storage().read(&keys, TokenKind::RefreshToken).unwrap().as_deref(), Some("r2"));

    first.shutdown();
    second.shutdown();
}
