//! Refresh deduplication within a tab and lock arbitration across tabs.

mod support;

use std::sync::Arc;
use std::time::Duration;

use authlab_common::storage::KeyValueStore;
use authlab_core::testing::MockTokenEndpoint;
use authlab_domain::constants::REFRESH_LOCK_KEY;
use authlab_domain::{AuthLabError, Config, TokenKind};
use support::{browser, TabHarness, EPOCH_MS};

fn slow_endpoint(latency_ms: u64) -> Arc<MockTokenEndpoint> {
    Arc::new(MockTokenEndpoint::new().with_latency(Duration::from_millis(latency_ms)))
}

/// Validates in-tab deduplication.
///
/// Assertions:
/// - Five concurrent callers cause one network request.
/// - Every caller sees the same token.
/// - Storage, provider and holder all carry the new token.
#[tokio::test(start_paused = true)]
async fn concurrent_refresh_issues_one_request() {
    let browser = browser();
    let endpoint = slow_endpoint(200);
    endpoint.push_tokens("a2", Some("r2"));
    let harness = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    harness.seed("a1", Some("r1"));
    harness.manager.init().await;

    let m = &harness.manager;
    let results = tokio::join!(m.refresh(), m.refresh(), m.refresh(), m.refresh(), m.refresh());
    let results = [results.0, results.1, results.2, results.3, results.4];

    assert_eq!(endpoint.refresh_calls(), 1);
    assert!(results.iter().all(|r| r.as_deref() == Some("a2")));
    assert_eq!(harness.stored(TokenKind::AccessToken).as_deref(), Some("a2"));
    assert_eq!(harness.stored(TokenKind::RefreshToken).as_deref(), Some("r2"));
    assert_eq!(harness.manager.provider().access_token().as_deref(), Some("a2"));
    assert_eq!(harness.manager.holder().token().as_deref(), Some("a2"));
    assert!(browser.local_store().view("probe").get(REFRESH_LOCK_KEY).unwrap().is_none());
}

/// Validates cross-tab lock arbitration.
///
/// Assertions:
/// - Two tabs refreshing together produce one network call.
/// - Both end up with the winner's token.
#[tokio::test(start_paused = true)]
async fn two_tabs_race_converges_on_one_call() {
    let browser = browser();
    let endpoint = slow_endpoint(300);
    endpoint.push_tokens("a2", Some("r2"));
    let a = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    let b = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    for tab in [&a, &b] {
        tab.seed("a1", Some("r1"));
        tab.manager.init().await;
    }

    let (from_a, from_b) = tokio::join!(a.manager.refresh(), b.manager.refresh());

    assert_eq!(endpoint.refresh_calls(), 1);
    assert_eq!(from_a.as_deref(), Some("a2"));
    assert_eq!(from_b.as_deref(), Some("a2"));
    assert_eq!(b.stored(TokenKind::AccessToken).as_deref(), Some("a2"));
    assert_eq!(b.manager.provider().access_token().as_deref(), Some("a2"));
}

#[tokio::test(start_paused = true)]
async fn stale_lock_is_taken_over() {
    let browser = browser();
    let endpoint = Arc::new(MockTokenEndpoint::new());
    endpoint.push_tokens("a2", None);
    let harness = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    harness.seed("a1", Some("r1"));
    harness.tab.local_store().set(REFRESH_LOCK_KEY, &(EPOCH_MS - 20_000).to_string()).unwrap();

    assert_eq!(harness.manager.refresh().await.as_deref(), Some("a2"));
    assert_eq!(endpoint.refresh_calls(), 1);
    assert!(harness.tab.local_store().get(REFRESH_LOCK_KEY).unwrap().is_none());
    // Rotation is optional; the old refresh token stays when none is returned
    assert_eq!(harness.stored(TokenKind::RefreshToken).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn fresh_lock_without_external_refresh_yields_none() {
    let browser = browser();
    let endpoint = Arc::new(MockTokenEndpoint::new());
    let harness = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    harness.seed("a1", Some("r1"));
    harness.tab.local_store().set(REFRESH_LOCK_KEY, &EPOCH_MS.to_string()).unwrap();

    let started = tokio::time::Instant::now();
    assert_eq!(harness.manager.refresh().await, None);

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(endpoint.call_count(), 0);
    assert_eq!(harness.stored(TokenKind::AccessToken).as_deref(), Some("a1"));
}

#[tokio::test(start_paused = true)]
async fn missing_refresh_token_yields_none() {
    let browser = browser();
    let harness = TabHarness::open(&browser);
    harness.seed("a1", None);

    assert_eq!(harness.manager.refresh().await, None);
    assert_eq!(harness.endpoint.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_grant_is_not_retried() {
    let browser = browser();
    let harness = TabHarness::open(&browser);
    harness.seed("a1", Some("r1"));
    harness.endpoint.push_error(AuthLabError::token_endpoint(400, "invalid_grant"));

    assert_eq!(harness.manager.refresh().await, None);
    assert_eq!(harness.endpoint.refresh_calls(), 1);
    assert_eq!(harness.stored(TokenKind::AccessToken).as_deref(), Some("a1"));
}

/// Validates that logout wins over a refresh in flight.
///
/// Assertions:
/// - The late token is discarded.
/// - Nothing is written back to storage.
#[tokio::test(start_paused = true)]
async fn logout_discards_refresh_in_flight() {
    let browser = browser();
    let endpoint = slow_endpoint(1_000);
    endpoint.push_tokens("late", Some("r2"));
    let harness = TabHarness::open_with(&browser, Config::default(), endpoint.clone());
    harness.seed("a1", Some("r1"));
    harness.manager.init().await;

    let pending = tokio::spawn({
        let manager = harness.manager.clone();
        async move { manager.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.manager.logout().await.unwrap();

    assert_eq!(pending.await.unwrap(), None);
    assert!(!harness.manager.state().logged_in);
    assert!(harness.stored(TokenKind::AccessToken).is_none());
    assert!(harness.stored(TokenKind::RefreshToken).is_none());
}
