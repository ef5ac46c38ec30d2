//! Hand-written Authorization Code + PKCE provider

use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use authlab_common::pkce::{generate_code_challenge, PkcePair};
use authlab_common::time::{Clock, ScheduledTask};
use authlab_domain::constants::{MISSING_VERIFIER_MESSAGE, SESSION_EXPIRED_MESSAGE};
use authlab_domain::{
    ApiRequest, ApiResponse, AuthConfig, AuthLabError, AuthMode, AuthPhase, AuthState,
    PkceDebugInfo, PkceExchangeState, Result, Session, TokenKind, TokenRequest,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::{AuthProvider, ProviderContext, ADMIN_PING_PATH, RSS_PATH, VALIDATE_PATH};
use crate::report::log_failure;
use crate::storage::SessionKeys;

/// What the current URL says about a pending authorization round-trip
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Error(String),
    None,
}

fn parse_callback(current_url: &str) -> (Callback, Option<String>) {
    let Ok(url) = Url::parse(current_url) else {
        return (Callback::None, None);
    };
    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    let mut clean = url;
    clean.set_query(None);
    clean.set_fragment(None);

    let callback = match (code, error) {
        (_, Some(error)) => Callback::Error(description.unwrap_or(error)),
        (Some(code), None) if !code.is_empty() => Callback::Code(code),
        _ => Callback::None,
    };
    (callback, Some(clean.to_string()))
}

struct PlainInner {
    ctx: ProviderContext,
    config: RwLock<AuthConfig>,
    keys: RwLock<SessionKeys>,
    session: Mutex<Session>,
    exchange: Mutex<PkceExchangeState>,
    state: watch::Sender<AuthState>,
    watcher: Mutex<Option<ScheduledTask>>,
}

impl PlainInner {
    fn keys(&self) -> SessionKeys {
        self.keys.read().clone()
    }

    fn config(&self) -> AuthConfig {
        self.config.read().clone()
    }

    fn publish(&self, state: AuthState) {
        self.ctx.holder.set_token(state.access_token.clone());
        debug!(phase = %state.phase, logged_in = state.logged_in, "auth state");
        self.state.send_replace(state);
    }

    fn publish_session(&self) {
        let state = {
            let session = self.session.lock();
            let phase =
                if session.is_authenticated() { AuthPhase::Authenticated } else { AuthPhase::Anonymous };
            AuthState::from_session(&session, phase)
        };
        self.publish(state);
    }

    fn stop_watcher(&self) {
        if let Some(task) = self.watcher.lock().take() {
            task.stop();
        }
    }

    fn start_watcher(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = ScheduledTask::every("expiry-watcher", self.ctx.session.expiry_poll(), move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.check_expiry(),
                    None => ControlFlow::Break(()),
                }
            }
        });
        // Replacing the slot drops, and so cancels, any previous watcher
        *self.watcher.lock() = Some(task);
    }

    fn check_expiry(&self) -> ControlFlow<()> {
        let now = self.ctx.storage.tab().clock().now_secs();
        let expiring = {
            let session = self.session.lock();
            if !session.is_authenticated() {
                return ControlFlow::Break(());
            }
            if !session.is_expired_at(now) {
                return ControlFlow::Continue(());
            }
            AuthState::from_session(&session, AuthPhase::Expiring)
        };

        info!(exp = ?expiring.access_token_exp, now, "access token expired");
        self.publish(expiring);
        self.session.lock().clear_access();
        if let Err(err) = self.ctx.storage.remove(&self.keys(), TokenKind::AccessToken) {
            warn!(error = %err, "removing expired access token failed");
        }
        self.publish(AuthState::failed(SESSION_EXPIRED_MESSAGE));
        ControlFlow::Break(())
    }

    fn clear_local(&self, reason: Option<String>) {
        self.stop_watcher();
        if let Err(err) = self.ctx.storage.clear(&self.keys()) {
            warn!(error = %err, "clearing stored session failed");
        }
        *self.session.lock() = Session::default();
        *self.exchange.lock() = PkceExchangeState::default();
        self.publish(reason.map_or_else(AuthState::anonymous, AuthState::failed));
    }

    async fn exchange_code(&self, code: String) -> Result<()> {
        let keys = self.keys();
        let config = self.config();
        let code_verifier = self
            .ctx
            .storage
            .read(&keys, TokenKind::PkceVerifier)?
            .ok_or_else(|| AuthLabError::Protocol(MISSING_VERIFIER_MESSAGE.to_string()))?;

        let request = TokenRequest::AuthorizationCode {
            client_id: config.client_id.clone(),
            code,
            redirect_uri: config.redirect_uri.clone(),
            code_verifier,
        };
        self.exchange.lock().last_token_request = Some(request.to_debug_value());

        let result = self.ctx.endpoint.request_token(&config.token_endpoint(), &request).await;

        // One attempt per verifier, whatever the outcome
        if let Err(err) = self.ctx.storage.remove(&keys, TokenKind::PkceVerifier) {
            warn!(error = %err, "removing PKCE verifier failed");
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.exchange.lock().last_token_response = Some(json!({ "error": err.to_string() }));
                return Err(err);
            }
        };
        self.exchange.lock().last_token_response =
            Some(serde_json::to_value(&response).unwrap_or_default());

        if response.access_token.is_empty() {
            return Err(AuthLabError::Protocol("Token response without access_token".to_string()));
        }

        self.ctx.storage.write(&keys, TokenKind::AccessToken, &response.access_token)?;
        if let Some(refresh) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.ctx.storage.write(&keys, TokenKind::RefreshToken, refresh)?;
        }
        *self.session.lock() = Session::from_tokens(response.access_token, response.refresh_token);
        info!(client_id = %config.client_id, "authorization code exchanged");
        Ok(())
    }

    fn restore(&self) -> Result<()> {
        let keys = self.keys();
        let access = self.ctx.storage.read(&keys, TokenKind::AccessToken)?;
        let refresh = self.ctx.storage.read(&keys, TokenKind::RefreshToken)?;
        *self.session.lock() = match access {
            Some(access) => Session::from_tokens(access, refresh),
            None => Session { refresh_token: refresh, ..Session::default() },
        };
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ApiResponse> {
        let token = self.session.lock().access_token.clone().ok_or(AuthLabError::NotAuthenticated)?;
        let request = ApiRequest::get(self.ctx.api.url(path)).with_bearer(&token);
        self.ctx.transport.send(request).await
    }
}

/// PKCE provider with a 1-second expiry watcher
#[derive(Clone)]
pub struct PlainAuthProvider {
    inner: Arc<PlainInner>,
}

impl std::fmt::Debug for PlainAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainAuthProvider")
            .field("keys", &*self.inner.keys.read())
            .field("phase", &self.inner.state.borrow().phase)
            .finish_non_exhaustive()
    }
}

impl PlainAuthProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        let (state, _) = watch::channel(AuthState::anonymous());
        Self {
            inner: Arc::new(PlainInner {
                config: RwLock::new(ctx.auth.clone()),
                keys: RwLock::new(SessionKeys::from_config(&ctx.auth)),
                ctx,
                session: Mutex::new(Session::default()),
                exchange: Mutex::new(PkceExchangeState::default()),
                state,
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Whether the expiry watcher is scheduled
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner.watcher.lock().as_ref().is_some_and(ScheduledTask::is_running)
    }

    fn authorization_url(config: &AuthConfig, pair: &PkcePair) -> Result<Url> {
        Url::parse_with_params(
            &config.authorization_endpoint(),
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", config.scope.as_str()),
                ("code_challenge_method", pair.challenge_method()),
                ("code_challenge", pair.code_challenge.as_str()),
            ],
        )
        .map_err(|e| AuthLabError::Config(format!("invalid authorization endpoint: {e}")))
    }
}

#[async_trait]
impl AuthProvider for PlainAuthProvider {
    fn mode(&self) -> AuthMode {
        AuthMode::Plain
    }

    async fn init(&self, config: &AuthConfig) -> AuthState {
        let inner = &self.inner;
        inner.stop_watcher();
        *inner.config.write() = config.clone();
        *inner.keys.write() = SessionKeys::from_config(config);

        let stored_verifier = match inner.ctx.storage.read(&inner.keys(), TokenKind::PkceVerifier) {
            Ok(verifier) => verifier,
            Err(err) => {
                warn!(error = %err, "PKCE verifier unreadable");
                None
            }
        };
        *inner.exchange.lock() = PkceExchangeState {
            code_challenge: stored_verifier.as_deref().map(generate_code_challenge),
            code_verifier: stored_verifier,
            ..PkceExchangeState::default()
        };

        let current_url = inner.ctx.navigator.current_url();
        let (callback, clean_url) = parse_callback(&current_url);
        match callback {
            Callback::Code(code) => {
                inner.publish(AuthState::anonymous().in_phase(AuthPhase::Exchanging));
                if let Err(err) = inner.exchange_code(code).await {
                    log_failure("authorization code exchange failed", &err);
                    let state = AuthState::failed(err.to_string());
                    inner.publish(state.clone());
                    return state;
                }
                if let Some(clean_url) = clean_url {
                    inner.ctx.navigator.replace_url(&clean_url);
                }
            }
            Callback::Error(reason) => {
                warn!(%reason, "authorization server returned an error");
                let state = AuthState::failed(reason);
                inner.publish(state.clone());
                return state;
            }
            Callback::None => {
                if let Err(err) = inner.restore() {
                    log_failure("restoring stored session failed", &err);
                    let state = AuthState::failed(err.to_string());
                    inner.publish(state.clone());
                    return state;
                }
            }
        }

        if inner.session.lock().is_authenticated() {
            inner.start_watcher();
        }
        inner.publish_session();
        self.state()
    }

    async fn login(&self) -> Result<()> {
        let inner = &self.inner;
        let config = inner.config();
        let pair = PkcePair::generate();
        let url = Self::authorization_url(&config, &pair)?;

        inner.ctx.storage.write(&inner.keys(), TokenKind::PkceVerifier, &pair.code_verifier)?;
        *inner.exchange.lock() = PkceExchangeState {
            code_verifier: Some(pair.code_verifier),
            code_challenge: Some(pair.code_challenge),
            authorization_url: Some(url.to_string()),
            ..PkceExchangeState::default()
        };
        inner.publish(AuthState::anonymous().in_phase(AuthPhase::Authorizing));
        info!(client_id = %config.client_id, "redirecting to authorization endpoint");
        inner.ctx.navigator.redirect(url.as_str());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let config = self.inner.config();
        self.inner.clear_local(None);

        let url = Url::parse_with_params(
            &config.end_session_endpoint(),
            &[
                ("client_id", config.client_id.as_str()),
                ("post_logout_redirect_uri", config.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| AuthLabError::Config(format!("invalid end-session endpoint: {e}")))?;
        info!(client_id = %config.client_id, "logged out, ending identity provider session");
        self.inner.ctx.navigator.redirect(url.as_str());
        Ok(())
    }

    fn local_logout(&self, reason: Option<String>) {
        info!("local logout");
        self.inner.clear_local(reason);
    }

    fn access_token(&self) -> Option<String> {
        self.inner.session.lock().access_token.clone()
    }

    fn adopt_access_token(&self, access: String) {
        if access.is_empty() || self.access_token().as_deref() == Some(access.as_str()) {
            return;
        }
        self.inner.session.lock().set_access_token(access);
        self.inner.start_watcher();
        self.inner.publish_session();
        debug!("adopted refreshed access token");
    }

    async fn validate_token(&self) -> Result<Value> {
        Ok(self.inner.get(VALIDATE_PATH).await?.normalized())
    }

    async fn fetch_rss(&self) -> Result<Value> {
        Ok(self.inner.get(RSS_PATH).await?.error_for_authorization()?.normalized())
    }

    async fn admin_ping(&self) -> Result<Value> {
        Ok(self.inner.get(ADMIN_PING_PATH).await?.status_and_body())
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    fn supports_debug_info(&self) -> bool {
        true
    }

    fn debug_info(&self) -> Option<PkceDebugInfo> {
        Some(self.inner.exchange.lock().debug_info(AuthMode::Plain))
    }

    fn account_url(&self) -> Option<String> {
        Some(self.inner.config.read().account_url())
    }

    fn shutdown(&self) {
        self.inner.stop_watcher();
    }
}
