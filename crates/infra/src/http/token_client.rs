//! Token endpoint client
//!
//! Form-encoded POST of an authorization-code or refresh-token grant.
//! Non-2xx answers carry the issuer's body verbatim in the error, which is
//! what the UI shows (`Token endpoint 400: {"error":"invalid_grant"}`).

use async_trait::async_trait;
use authlab_core::TokenEndpoint;
use authlab_domain::{AuthLabError, Result, TokenRequest, TokenResponse};
use reqwest::header::ACCEPT;
use reqwest::Method;
use tracing::{debug, warn};

use super::HttpClient;
use crate::errors::InfraError;

/// [`TokenEndpoint`] backed by reqwest
#[derive(Debug, Clone)]
pub struct KeycloakTokenClient {
    http: HttpClient,
}

impl KeycloakTokenClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenEndpoint for KeycloakTokenClient {
    async fn request_token(&self, endpoint: &str, request: &TokenRequest) -> Result<TokenResponse> {
        let grant = request.grant_type();
        let builder = self
            .http
            .request(Method::POST, endpoint)
            .header(ACCEPT, "application/json")
            .form(&request.form_fields());

        let response = self.http.send(builder).await?;
        let status = response.status();
        let body = response.text().await.map_err(|err| AuthLabError::from(InfraError::from(err)))?;

        if !status.is_success() {
            warn!(grant, status = status.as_u16(), "token endpoint rejected grant");
            return Err(AuthLabError::token_endpoint(status.as_u16(), &body));
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;
        debug!(
            grant,
            rotated = tokens.refresh_token.is_some(),
            expires_in = ?tokens.expires_in,
            "token endpoint granted tokens"
        );
        Ok(tokens)
    }
}
