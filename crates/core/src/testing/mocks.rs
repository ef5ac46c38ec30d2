//! Mock implementations of the session ports

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authlab_domain::{
    ApiRequest, ApiResponse, AuthLabError, Result, TokenRequest, TokenResponse,
};
use parking_lot::Mutex;
use serde_json::json;

use crate::ports::{HttpTransport, Navigator, TokenEndpoint};

type Scripted = Arc<Mutex<VecDeque<Result<TokenResponse>>>>;
type Handler = Arc<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// Scripted token endpoint
///
/// Answers are consumed in order; an empty script yields a transport error.
/// Every call is recorded before the optional latency elapses, so counts
/// are visible while a request is in flight.
///
/// # Examples
///
/// ```
/// use authlab_core::testing::MockTokenEndpoint;
///
/// let endpoint = MockTokenEndpoint::new();
/// endpoint.push_tokens("access", Some("refresh"));
/// assert_eq!(endpoint.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTokenEndpoint {
    script: Scripted,
    calls: Arc<Mutex<Vec<(String, TokenRequest)>>>,
    latency: Option<Duration>,
}

impl std::fmt::Debug for MockTokenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTokenEndpoint")
            .field("scripted", &self.script.lock().len())
            .field("calls", &self.call_count())
            .finish()
    }
}

impl MockTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every answer
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_response(&self, response: TokenResponse) {
        self.script.lock().push_back(Ok(response));
    }

    /// Successful answer carrying `access` and an optional refresh token
    pub fn push_tokens(&self, access: &str, refresh: Option<&str>) {
        self.push_response(TokenResponse::new(access, refresh.map(str::to_string)));
    }

    pub fn push_error(&self, error: AuthLabError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls using the refresh-token grant
    pub fn refresh_calls(&self) -> usize {
        self.count_grant("refresh_token")
    }

    /// Calls using the authorization-code grant
    pub fn exchange_calls(&self) -> usize {
        self.count_grant("authorization_code")
    }

    pub fn requests(&self) -> Vec<(String, TokenRequest)> {
        self.calls.lock().clone()
    }

    pub fn last_request(&self) -> Option<TokenRequest> {
        self.calls.lock().last().map(|(_, request)| request.clone())
    }

    fn count_grant(&self, grant: &str) -> usize {
        self.calls.lock().iter().filter(|(_, r)| r.grant_type() == grant).count()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn request_token(&self, endpoint: &str, request: &TokenRequest) -> Result<TokenResponse> {
        self.calls.lock().push((endpoint.to_string(), request.clone()));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| {
            Err(AuthLabError::Transport("mock token endpoint has no scripted response".into()))
        })
    }
}

/// Resource server double
///
/// Routes by exact URL. A route with several queued responses serves them
/// in order and then repeats the last one. Unrouted URLs get
/// `200 {"ok": true}`, unless a handler is installed.
#[derive(Clone, Default)]
pub struct MockHttpTransport {
    routes: Arc<Mutex<HashMap<String, VecDeque<ApiResponse>>>>,
    handler: Arc<Mutex<Option<Handler>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl std::fmt::Debug for MockHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpTransport").field("requests", &self.requests.lock().len()).finish()
    }
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`
    pub fn respond(&self, url: &str, response: ApiResponse) {
        self.routes.lock().entry(url.to_string()).or_default().push_back(response);
    }

    /// Answer unrouted requests with `handler`
    pub fn respond_with<F>(&self, handler: F)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn answer(&self, request: &ApiRequest) -> ApiResponse {
        if let Some(queue) = self.routes.lock().get_mut(&request.url) {
            if queue.len() > 1 {
                if let Some(response) = queue.pop_front() {
                    return response;
                }
            }
            if let Some(response) = queue.front() {
                return response.clone();
            }
        }
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler(request),
            None => ApiResponse::json(200, &json!({ "ok": true })),
        }
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.answer(&request);
        self.requests.lock().push(request);
        Ok(response)
    }
}

/// Location bar double that records navigation
#[derive(Debug, Clone)]
pub struct RecordingNavigator {
    current: Arc<Mutex<String>>,
    redirects: Arc<Mutex<Vec<String>>>,
    replacements: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new(current_url: &str) -> Self {
        Self {
            current: Arc::new(Mutex::new(current_url.to_string())),
            redirects: Arc::new(Mutex::new(Vec::new())),
            replacements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulate arriving at `url`, e.g. the authorization callback
    pub fn set_url(&self, url: &str) {
        *self.current.lock() = url.to_string();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.redirects.lock().last().cloned()
    }

    pub fn replacements(&self) -> Vec<String> {
        self.replacements.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_url(&self) -> String {
        self.current.lock().clone()
    }

    fn redirect(&self, url: &str) {
        self.redirects.lock().push(url.to_string());
    }

    fn replace_url(&self, url: &str) {
        *self.current.lock() = url.to_string();
        self.replacements.lock().push(url.to_string());
    }
}
