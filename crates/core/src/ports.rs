//! Port interfaces for the session layer
//!
//! These traits define the boundaries between session logic and the outside
//! world: the identity provider's token endpoint, the resource API, and the
//! browser location bar.

use async_trait::async_trait;
use authlab_domain::{ApiRequest, ApiResponse, Result, TokenRequest, TokenResponse};

/// OAuth token endpoint
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// POST a form-encoded grant to `endpoint`
    ///
    /// Non-2xx answers must surface as
    /// [`AuthLabError::token_endpoint`](authlab_domain::AuthLabError::token_endpoint).
    async fn request_token(&self, endpoint: &str, request: &TokenRequest) -> Result<TokenResponse>;
}

/// Transport for resource API calls
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request; any HTTP status is a successful send
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// The tab's location bar
pub trait Navigator: Send + Sync {
    /// Current absolute URL
    fn current_url(&self) -> String;

    /// Navigate away (authorization or end-session redirect)
    fn redirect(&self, url: &str);

    /// Rewrite the current URL without navigating
    fn replace_url(&self, url: &str);
}
