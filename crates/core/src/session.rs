//! Session manager: owns the active provider and wires the tab's services
//!
//! One manager per tab. It picks the provider from the persisted auth mode,
//! forwards provider state to subscribers, routes tab sync messages and
//! refresh results into the provider, and turns idle expiry into a logout.

use std::sync::{Arc, Weak};

use authlab_common::storage::KeyValueStore;
use authlab_domain::constants::AUTH_MODE_KEY;
use authlab_domain::{
    ApiRequest, ApiResponse, AuthMode, AuthState, Config, IdlePhase, PkceDebugInfo, Result,
    StorageStrategy, TabMessage, TabMessageKind, TokenKind,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::auth::{create_provider, AuthProvider, ProviderContext};
use crate::browser::Tab;
use crate::holder::TokenHolder;
use crate::idle::IdleMonitor;
use crate::interceptor::AuthInterceptor;
use crate::ports::{HttpTransport, Navigator, TokenEndpoint};
use crate::refresh::RefreshCoordinator;
use crate::storage::{SessionKeys, StorageAdapter};
use crate::sync::{Subscription, TabSyncBus};

/// Outside-world adapters for one tab
#[derive(Clone)]
pub struct SessionPorts {
    pub endpoint: Arc<dyn TokenEndpoint>,
    pub transport: Arc<dyn HttpTransport>,
    pub navigator: Arc<dyn Navigator>,
}

struct ManagerInner {
    tab: Tab,
    config: Config,
    ports: SessionPorts,
    storage: StorageAdapter,
    keys: SessionKeys,
    holder: TokenHolder,
    bus: TabSyncBus,
    refresh: RefreshCoordinator,
    interceptor: AuthInterceptor,
    idle: IdleMonitor,
    provider: RwLock<Arc<dyn AuthProvider>>,
    state: watch::Sender<AuthState>,
    forwarder: Mutex<Option<DropGuard>>,
    bus_subscription: Mutex<Option<Subscription>>,
    cancel: CancellationToken,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.provider.read().shutdown();
        self.idle.stop();
        self.bus.stop();
    }
}

impl ManagerInner {
    fn provider(&self) -> Arc<dyn AuthProvider> {
        self.provider.read().clone()
    }

    fn provider_context(&self) -> ProviderContext {
        context_for(&self.config, &self.ports, &self.storage, &self.holder, &self.interceptor)
    }

    /// Forward `provider`'s states until the next provider replaces it
    fn attach(self: &Arc<Self>, provider: &Arc<dyn AuthProvider>) {
        let token = self.cancel.child_token();
        let cancel = token.clone();
        let mut rx = provider.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let state = rx.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(inner) => inner.on_provider_state(state),
                    None => break,
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = rx.changed() => if changed.is_err() { break },
                }
            }
        });
        // Dropping the previous guard stops the previous forwarder
        *self.forwarder.lock() = Some(token.drop_guard());
    }

    fn on_provider_state(&self, state: AuthState) {
        let idle_phase = self.idle.state().phase;
        if state.logged_in && idle_phase == IdlePhase::Disabled {
            self.idle.start();
        } else if !state.logged_in && idle_phase != IdlePhase::Disabled {
            self.idle.stop();
        }
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn on_tab_message(&self, message: TabMessage) {
        match message.kind {
            TabMessageKind::Logout => {
                info!(tab_id = %self.tab.id(), from = %message.from, "logout from another tab");
                self.refresh.invalidate();
                self.idle.stop();
                self.provider().local_logout(None);
            }
            TabMessageKind::Refresh => {
                let Some(access) = message.access_token() else {
                    debug!(from = %message.from, "refresh message without access token");
                    return;
                };
                if let Err(err) = self.storage.write(&self.keys, TokenKind::AccessToken, access) {
                    warn!(error = %err, "storing token from another tab failed");
                }
                self.holder.set_token(Some(access.to_string()));
                self.provider().adopt_access_token(access.to_string());
                debug!(tab_id = %self.tab.id(), from = %message.from, "adopted token from another tab");
            }
            TabMessageKind::Ping => {
                debug!(tab_id = %self.tab.id(), from = %message.from, "ping");
            }
        }
    }

    async fn logout(&self) -> Result<()> {
        self.refresh.invalidate();
        self.idle.stop();
        let result = self.provider().logout().await;
        if let Err(err) = self.bus.broadcast_logout() {
            warn!(error = %err, "logout broadcast failed");
        }
        result
    }

    fn spawn_idle_watch(self: &Arc<Self>) {
        let mut rx = self.idle.subscribe();
        let cancel = self.cancel.clone();
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = rx.changed() => if changed.is_err() { break },
                }
                if !rx.borrow_and_update().is_expired() {
                    continue;
                }
                let Some(inner) = weak.upgrade() else { break };
                if !inner.config.idle.auto_logout {
                    info!(tab_id = %inner.tab.id(), "idle timeout reached, auto logout disabled");
                    continue;
                }
                info!(tab_id = %inner.tab.id(), "idle timeout reached, logging out");
                if let Err(err) = inner.logout().await {
                    warn!(error = %err, "idle logout failed");
                }
            }
        });
    }
}

/// Session lifecycle for one tab, cheap to clone
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("tab_id", &self.inner.tab.id())
            .field("mode", &self.mode())
            .field("strategy", &self.inner.storage.strategy())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Wire up a tab
    ///
    /// # Errors
    /// [`AuthLabError::Config`](authlab_domain::AuthLabError::Config) for an
    /// invalid configuration or allow-list pattern.
    pub fn new(tab: Tab, config: Config, ports: SessionPorts) -> Result<Self> {
        config.validate()?;

        let storage = StorageAdapter::open(tab.clone(), config.session.storage_strategy);
        let keys = SessionKeys::from_config(&config.auth);
        let holder = TokenHolder::new();
        let bus = TabSyncBus::start(&tab, &config.tab_sync);
        let refresh = RefreshCoordinator::new(
            storage.clone(),
            Arc::clone(&ports.endpoint),
            bus.clone(),
            holder.clone(),
            &config.auth,
            &config.session,
        );
        let interceptor = AuthInterceptor::new(
            &config.api,
            holder.clone(),
            storage.clone(),
            keys.clone(),
            refresh.clone(),
            Arc::clone(&ports.transport),
        )?;
        let idle = IdleMonitor::new(config.idle.clone(), tab.clock().clone());
        let mode = persisted_mode(&tab).unwrap_or(config.session.mode);

        let provider =
            create_provider(mode, context_for(&config, &ports, &storage, &holder, &interceptor));
        let (state, _) = watch::channel(AuthState::anonymous());

        let inner = Arc::new(ManagerInner {
            tab,
            config,
            ports,
            storage,
            keys,
            holder,
            bus,
            refresh,
            interceptor,
            idle,
            provider: RwLock::new(Arc::clone(&provider)),
            state,
            forwarder: Mutex::new(None),
            bus_subscription: Mutex::new(None),
            cancel: CancellationToken::new(),
        });

        inner.attach(&provider);

        let weak = Arc::downgrade(&inner);
        let subscription = inner.bus.on_message(move |message| {
            if let Some(inner) = weak.upgrade() {
                inner.on_tab_message(message);
            }
        });
        *inner.bus_subscription.lock() = Some(subscription);

        let weak = Arc::downgrade(&inner);
        inner.refresh.on_refreshed(Arc::new(move |access: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.provider().adopt_access_token(access.to_string());
            }
        }));

        inner.spawn_idle_watch();
        info!(tab_id = %inner.tab.id(), %mode, strategy = %inner.storage.strategy(), "session manager ready");
        Ok(Self { inner })
    }

    /// Initialise the active provider
    pub async fn init(&self) -> AuthState {
        let state = self.provider().init(&self.inner.config.auth).await;
        self.inner.on_provider_state(state.clone());
        state
    }

    /// Start an authorization round-trip
    ///
    /// # Errors
    /// Whatever the provider reports, e.g. not implemented.
    pub async fn login(&self) -> Result<()> {
        self.provider().login().await
    }

    /// Log out locally, end the issuer session and tell the other tabs
    ///
    /// # Errors
    /// The provider's logout error; the broadcast still goes out.
    pub async fn logout(&self) -> Result<()> {
        self.inner.logout().await
    }

    /// Persist `mode`, replace the provider and initialise it
    ///
    /// # Errors
    /// Storage failures persisting the mode.
    pub async fn switch_mode(&self, mode: AuthMode) -> Result<AuthState> {
        self.inner.tab.local_store().set(AUTH_MODE_KEY, &mode.to_string())?;

        let previous = self.provider();
        previous.shutdown();
        let provider = create_provider(mode, self.inner.provider_context());
        *self.inner.provider.write() = Arc::clone(&provider);
        self.inner.attach(&provider);
        info!(tab_id = %self.inner.tab.id(), from = %previous.mode(), to = %mode, "auth mode switched");

        Ok(self.init().await)
    }

    /// Move token material to another backend
    ///
    /// # Errors
    /// Storage failures during migration.
    pub fn set_storage_strategy(&self, strategy: StorageStrategy) -> Result<()> {
        self.inner.storage.set_strategy(&self.inner.keys, strategy)
    }

    /// Refresh now; `None` means the session could not be kept
    pub async fn refresh(&self) -> Option<String> {
        self.inner.refresh.refresh().await
    }

    /// Send a request through the interceptor
    ///
    /// # Errors
    /// Transport failures.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.inner.interceptor.send(request).await
    }

    pub async fn validate_token(&self) -> Result<Value> {
        self.provider().validate_token().await
    }

    pub async fn fetch_rss(&self) -> Result<Value> {
        self.provider().fetch_rss().await
    }

    pub async fn admin_ping(&self) -> Result<Value> {
        self.provider().admin_ping().await
    }

    /// User activity signal for the idle monitor
    pub fn record_activity(&self) {
        self.inner.idle.record_activity();
    }

    /// States of whichever provider is active
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.provider().state()
    }

    #[must_use]
    pub fn mode(&self) -> AuthMode {
        self.provider().mode()
    }

    #[must_use]
    pub fn provider(&self) -> Arc<dyn AuthProvider> {
        self.inner.provider()
    }

    #[must_use]
    pub fn debug_info(&self) -> Option<PkceDebugInfo> {
        let provider = self.provider();
        if provider.supports_debug_info() {
            provider.debug_info()
        } else {
            None
        }
    }

    #[must_use]
    pub fn account_url(&self) -> Option<String> {
        self.provider().account_url()
    }

    pub fn tab(&self) -> &Tab {
        &self.inner.tab
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.inner.storage
    }

    pub fn bus(&self) -> &TabSyncBus {
        &self.inner.bus
    }

    pub fn idle(&self) -> &IdleMonitor {
        &self.inner.idle
    }

    pub fn interceptor(&self) -> &AuthInterceptor {
        &self.inner.interceptor
    }

    pub fn holder(&self) -> &TokenHolder {
        &self.inner.holder
    }

    /// Stop every timer and listener owned by this tab
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.provider().shutdown();
        self.inner.idle.stop();
        self.inner.bus.stop();
        debug!(tab_id = %self.inner.tab.id(), "session manager shut down");
    }
}

fn context_for(
    config: &Config,
    ports: &SessionPorts,
    storage: &StorageAdapter,
    holder: &TokenHolder,
    interceptor: &AuthInterceptor,
) -> ProviderContext {
    ProviderContext {
        storage: storage.clone(),
        endpoint: Arc::clone(&ports.endpoint),
        // Resource calls go through the interceptor for 401 recovery
        transport: Arc::new(interceptor.clone()),
        navigator: Arc::clone(&ports.navigator),
        holder: holder.clone(),
        auth: config.auth.clone(),
        api: config.api.clone(),
        session: config.session.clone(),
    }
}

fn persisted_mode(tab: &Tab) -> Option<AuthMode> {
    match tab.local_store().get(AUTH_MODE_KEY) {
        Ok(Some(raw)) => match raw.parse::<AuthMode>() {
            Ok(mode) => Some(mode),
            Err(err) => {
                warn!(error = %err, "ignoring persisted auth mode");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(error = %err, "auth mode unreadable");
            None
        }
    }
}
