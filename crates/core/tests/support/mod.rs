//! Shared test helpers for `authlab-core` integration tests.
//!
//! Tabs run on a paused tokio clock anchored at a fixed epoch, so timer
//! assertions are exact.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authlab_common::time::{Clock, TokioClock};
use authlab_core::testing::{MockHttpTransport, MockTokenEndpoint, RecordingNavigator};
use authlab_core::{Browser, SessionKeys, SessionManager, SessionPorts, Tab};
use authlab_domain::{AuthState, Config, TokenKind};
use tokio::sync::watch;

pub const EPOCH_MS: i64 = 1_700_000_000_000;
pub const HOME_URL: &str = "https://localhost/";

pub fn browser() -> Browser {
    Browser::with_clock(Arc::new(TokioClock::anchored_at(EPOCH_MS)))
}

pub fn now_secs(browser: &Browser) -> i64 {
    browser.clock().now_secs()
}

pub fn keys() -> SessionKeys {
    SessionKeys::from_config(&Config::default().auth)
}

/// One tab with its session manager and port doubles
pub struct TabHarness {
    pub tab: Tab,
    pub config: Config,
    pub manager: SessionManager,
    pub endpoint: Arc<MockTokenEndpoint>,
    pub transport: Arc<MockHttpTransport>,
    pub navigator: Arc<RecordingNavigator>,
}

impl TabHarness {
    pub fn open(browser: &Browser) -> Self {
        Self::open_with(browser, Config::default(), Arc::new(MockTokenEndpoint::new()))
    }

    pub fn open_with(browser: &Browser, config: Config, endpoint: Arc<MockTokenEndpoint>) -> Self {
        Self::build(
            browser.open_tab(),
            config,
            endpoint,
            Arc::new(MockHttpTransport::new()),
            Arc::new(RecordingNavigator::new(HOME_URL)),
        )
    }

    fn build(
        tab: Tab,
        config: Config,
        endpoint: Arc<MockTokenEndpoint>,
        transport: Arc<MockHttpTransport>,
        navigator: Arc<RecordingNavigator>,
    ) -> Self {
        let ports = SessionPorts {
            endpoint: endpoint.clone(),
            transport: transport.clone(),
            navigator: navigator.clone(),
        };
        let manager = SessionManager::new(tab.clone(), config.clone(), ports).unwrap();
        Self { tab, config, manager, endpoint, transport, navigator }
    }

    /// The same tab after a page load, sharing the doubles
    pub fn reload(self) -> Self {
        self.manager.shutdown();
        Self::build(self.tab.reload(), self.config, self.endpoint, self.transport, self.navigator)
    }

    /// Write tokens through the tab's storage adapter
    pub fn seed(&self, access: &str, refresh: Option<&str>) {
        let storage = self.manager.storage();
        storage.write(&keys(), TokenKind::AccessToken, access).unwrap();
        if let Some(refresh) = refresh {
            storage.write(&keys(), TokenKind::RefreshToken, refresh).unwrap();
        }
    }

    pub fn stored(&self, kind: TokenKind) -> Option<String> {
        self.manager.storage().read(&keys(), kind).unwrap()
    }
}

/// Wait until the state satisfies `pred`, or panic after a second
pub async fn wait_for_state<F>(rx: &mut watch::Receiver<AuthState>, pred: F) -> AuthState
where
    F: Fn(&AuthState) -> bool,
{
    let waiting = async {
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(1), waiting).await.expect("state not reached")
}
