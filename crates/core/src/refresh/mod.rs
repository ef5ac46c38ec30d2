//! Refresh coordinator
//!
//! Within a tab, concurrent [`RefreshCoordinator::refresh`] calls share one
//! in-flight future. Across tabs, a best-effort lock in the shared store
//! picks a single refresher; the others poll their token storage for the
//! value the winner broadcasts. A lost session is reported as `None` and is
//! not retried.
//!
//! Each refresh runs as a spawned task. Callers only await its result, so
//! dropping them cannot park the lock guard inside an unpolled future.

mod lock;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authlab_common::storage::KeyValueStore;
use authlab_common::time::Clock;
use authlab_domain::constants::REFRESH_LOCK_KEY;
use authlab_domain::{AuthConfig, SessionConfig, TokenKind, TokenRequest};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use self::lock::{fresh_lock_age, RefreshLockGuard};
use crate::holder::TokenHolder;
use crate::ports::TokenEndpoint;
use crate::report::log_failure;
use crate::storage::{SessionKeys, StorageAdapter};
use crate::sync::TabSyncBus;

/// Called with the new access token after a successful refresh
pub type RefreshListener = Arc<dyn Fn(&str) + Send + Sync>;

type InFlight = Shared<BoxFuture<'static, Option<String>>>;

struct RefreshInner {
    storage: StorageAdapter,
    keys: SessionKeys,
    endpoint: Arc<dyn TokenEndpoint>,
    token_url: String,
    client_id: String,
    bus: TabSyncBus,
    holder: TokenHolder,
    clock: Arc<dyn Clock>,
    lock_stale_ms: u64,
    wait: Duration,
    poll: Duration,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    listeners: Mutex<Vec<RefreshListener>>,
}

/// Performs the refresh-token grant for one tab, cheap to clone
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<RefreshInner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("token_url", &self.inner.token_url)
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        storage: StorageAdapter,
        endpoint: Arc<dyn TokenEndpoint>,
        bus: TabSyncBus,
        holder: TokenHolder,
        auth: &AuthConfig,
        session: &SessionConfig,
    ) -> Self {
        let clock = storage.tab().clock().clone();
        Self {
            inner: Arc::new(RefreshInner {
                keys: SessionKeys::from_config(auth),
                storage,
                endpoint,
                token_url: auth.token_endpoint(),
                client_id: auth.client_id.clone(),
                bus,
                holder,
                clock,
                lock_stale_ms: session.refresh_lock_stale_ms,
                wait: session.refresh_wait(),
                poll: session.refresh_poll(),
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Obtain a new access token, or `None` when the session cannot be kept
    pub async fn refresh(&self) -> Option<String> {
        let shared = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!("joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    let task = tokio::spawn(Self::run(Arc::clone(&self.inner)));
                    let fut = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(err) => {
                                warn!(error = %err, "refresh task failed");
                                None
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        shared.await
    }

    /// Register a callback for successful refreshes
    pub fn on_refreshed(&self, listener: RefreshListener) {
        self.inner.listeners.lock().push(listener);
    }

    /// Discard the result of any refresh currently running
    ///
    /// Called on logout so a late token cannot revive the session.
    pub fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    async fn run(inner: Arc<RefreshInner>) -> Option<String> {
        let slot = InFlightSlot(&inner.in_flight);
        let outcome = inner.coordinate().await;
        drop(slot);

        if let Some(access) = &outcome {
            inner.holder.set_token(Some(access.clone()));
            let listeners: Vec<RefreshListener> = inner.listeners.lock().clone();
            for listener in listeners {
                listener(access);
            }
        }
        outcome
    }
}

/// Empties the in-flight slot when the refresh task ends, panics included
struct InFlightSlot<'a>(&'a Mutex<Option<InFlight>>);

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

impl RefreshInner {
    async fn coordinate(&self) -> Option<String> {
        let generation = self.generation.load(Ordering::SeqCst);
        let lock_store = self.storage.tab().local_store();
        let now = self.clock.now_millis();

        let observed = match lock_store.get(REFRESH_LOCK_KEY) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "refresh lock unreadable");
                return None;
            }
        };

        if let Some(age_ms) = fresh_lock_age(observed.as_deref(), now, self.lock_stale_ms) {
            debug!(age_ms, "refresh lock held by another tab, waiting");
            return self.await_external(generation).await;
        }

        let guard = match RefreshLockGuard::acquire(lock_store, observed.as_deref(), now) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                debug!("lost refresh lock race, waiting");
                return self.await_external(generation).await;
            }
            Err(err) => {
                warn!(error = %err, "refresh lock acquisition failed");
                return None;
            }
        };

        let refreshed = self.perform(generation).await;
        if let Some(access) = &refreshed {
            if let Err(err) = self.bus.broadcast_refresh(access) {
                warn!(error = %err, "refresh broadcast failed");
            }
        }
        drop(guard);
        refreshed
    }

    /// Run the refresh-token grant and store the result
    ///
    /// A new access token that cannot be stored counts as a failed refresh:
    /// nothing is returned or broadcast.
    async fn perform(&self, generation: u64) -> Option<String> {
        let refresh_token = match self.storage.read(&self.keys, TokenKind::RefreshToken) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no refresh token stored");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "refresh token unreadable");
                return None;
            }
        };

        let request =
            TokenRequest::RefreshToken { client_id: self.client_id.clone(), refresh_token };
        let response = match self.endpoint.request_token(&self.token_url, &request).await {
            Ok(response) => response,
            Err(err) => {
                log_failure("refresh grant failed", &err);
                return None;
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            info!("session ended during refresh, discarding new token");
            return None;
        }
        if response.access_token.is_empty() {
            warn!("refresh response carried no access token");
            return None;
        }

        // A rotated refresh token replaces the spent one even if the access
        // token cannot be stored
        if let Some(rotated) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            if let Err(err) = self.storage.write(&self.keys, TokenKind::RefreshToken, rotated) {
                log_failure("storing rotated refresh token failed", &err);
            }
        }
        if let Err(err) = self.storage.write(&self.keys, TokenKind::AccessToken, &response.access_token) {
            log_failure("storing refreshed access token failed", &err);
            return None;
        }
        info!("access token refreshed");
        Some(response.access_token)
    }

    /// Poll token storage for a value written by another tab's refresh
    async fn await_external(&self, generation: u64) -> Option<String> {
        let initial = self.storage.read(&self.keys, TokenKind::AccessToken).ok().flatten();
        let deadline = Instant::now() + self.wait;

        while Instant::now() < deadline {
            tokio::time::sleep(self.poll).await;
            if self.generation.load(Ordering::SeqCst) != generation {
                return None;
            }
            let current = self.storage.read(&self.keys, TokenKind::AccessToken).ok().flatten();
            if current.is_some() && current != initial {
                debug!("adopting token refreshed by another tab");
                return current;
            }
        }
        info!(wait_ms = self.wait.as_millis() as u64, "no external refresh observed");
        None
    }
}
