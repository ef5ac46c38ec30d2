//! Idle countdown and auto logout.

mod support;

use std::sync::Arc;
use std::time::Duration;

use authlab_common::time::TokioClock;
use authlab_core::testing::MockTokenEndpoint;
use authlab_core::IdleMonitor;
use authlab_domain::{Config, IdleConfig, IdlePhase};
use support::{browser, wait_for_state, TabHarness, EPOCH_MS};

fn idle_config(auto_logout: bool) -> IdleConfig {
    IdleConfig { enabled: true, timeout_secs: 10, warning_secs: 3, auto_logout }
}

/// Validates the countdown.
///
/// Assertions:
/// - One second left at t=9s, zero and expired at t=10s.
#[tokio::test(start_paused = true)]
async fn countdown_reaches_zero_at_ten_seconds() {
    let monitor = IdleMonitor::new(idle_config(true), Arc::new(TokioClock::anchored_at(EPOCH_MS)));
    monitor.start();
    assert_eq!(monitor.state().remaining_secs, 10);

    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(monitor.state().remaining_secs, 1);
    assert_eq!(monitor.state().phase, IdlePhase::Warning);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.state().remaining_secs, 0);
    assert!(monitor.state().is_expired());
}

/// Validates activity reset.
///
/// Assertions:
/// - Activity at t=5s restores the full ten seconds.
/// - Expiry moves to t=15s.
#[tokio::test(start_paused = true)]
async fn activity_resets_countdown() {
    let monitor = IdleMonitor::new(idle_config(true), Arc::new(TokioClock::anchored_at(EPOCH_MS)));
    monitor.start();

    tokio::time::sleep(Duration::from_secs(5)).await;
    monitor.record_activity();
    assert_eq!(monitor.state().remaining_secs, 10);
    assert_eq!(monitor.state().phase, IdlePhase::Armed);

    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert!(!monitor.state().is_expired());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(monitor.state().is_expired());
}

#[tokio::test(start_paused = true)]
async fn monitor_stays_disabled_until_login() {
    let browser = browser();
    let config = Config { idle: idle_config(true), ..Config::default() };
    let harness = TabHarness::open_with(&browser, config, Arc::new(MockTokenEndpoint::new()));
    harness.manager.init().await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(harness.manager.idle().state().phase, IdlePhase::Disabled);
}

/// Validates idle auto logout.
///
/// Assertions:
/// - The idle tab logs out and redirects to the end-session endpoint.
/// - The other tab follows through the logout broadcast.
#[tokio::test(start_paused = true)]
async fn idle_timeout_logs_out_every_tab() {
    let browser = browser();
    let config = Config { idle: idle_config(true), ..Config::default() };
    let a = TabHarness::open_with(&browser, config, Arc::new(MockTokenEndpoint::new()));
    let b = TabHarness::open(&browser);
    for tab in [&a, &b] {
        tab.seed("a1", Some("r1"));
        tab.manager.init().await;
    }
    assert_eq!(a.manager.idle().state().phase, IdlePhase::Armed);
    let mut b_states = b.manager.subscribe();

    tokio::time::sleep(Duration::from_millis(10_500)).await;

    assert!(!a.manager.state().logged_in);
    assert!(a.navigator.last_redirect().unwrap().contains("/protocol/openid-connect/logout"));
    wait_for_state(&mut b_states, |s| !s.logged_in).await;
}

#[tokio::test(start_paused = true)]
async fn expiry_without_auto_logout_is_only_reported() {
    let browser = browser();
    let config = Config { idle: idle_config(false), ..Config::default() };
    let harness = TabHarness::open_with(&browser, config, Arc::new(MockTokenEndpoint::new()));
    harness.seed("a1", Some("r1"));
    harness.manager.init().await;

    tokio::time::sleep(Duration::from_millis(10_500)).await;

    assert!(harness.manager.idle().state().is_expired());
    assert!(harness.manager.state().logged_in);
    assert!(harness.navigator.redirects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn activity_through_manager_keeps_session() {
    let browser = browser();
    let config = Config { idle: idle_config(true), ..Config::default() };
    let harness = TabHarness::open_with(&browser, config, Arc::new(MockTokenEndpoint::new()));
    harness.seed("a1", Some("r1"));
    harness.manager.init().await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(6)).await;
        harness.manager.record_activity();
    }

    assert!(harness.manager.state().logged_in);
    assert_eq!(harness.manager.idle().state().remaining_secs, 10);
}
