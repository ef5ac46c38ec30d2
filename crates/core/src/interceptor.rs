//! Request interceptor: bearer attachment and one-shot 401 recovery

use std::sync::Arc;

use async_trait::async_trait;
use authlab_domain::{
    ApiConfig, ApiRequest, ApiResponse, AttachmentRecord, AuthLabError, Result, TokenKind,
};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::holder::TokenHolder;
use crate::ports::HttpTransport;
use crate::refresh::RefreshCoordinator;
use crate::storage::{SessionKeys, StorageAdapter};

/// Attaches the tab's access token to allow-listed requests
///
/// A 401 on an attached request triggers a single refresh; on success the
/// request is retried once with the new token, otherwise the original 401
/// goes back to the caller.
#[derive(Clone)]
pub struct AuthInterceptor {
    allowlist: Arc<Vec<Regex>>,
    holder: TokenHolder,
    storage: StorageAdapter,
    keys: SessionKeys,
    refresh: RefreshCoordinator,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let patterns: Vec<&str> = self.allowlist.iter().map(Regex::as_str).collect();
        f.debug_struct("AuthInterceptor").field("allowlist", &patterns).finish_non_exhaustive()
    }
}

impl AuthInterceptor {
    /// Build from API config
    ///
    /// # Errors
    /// [`AuthLabError::Config`] when an allow-list pattern does not compile.
    pub fn new(
        api: &ApiConfig,
        holder: TokenHolder,
        storage: StorageAdapter,
        keys: SessionKeys,
        refresh: RefreshCoordinator,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let allowlist = api
            .allowlist
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    AuthLabError::Config(format!("invalid allowlist pattern {pattern:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { allowlist: Arc::new(allowlist), holder, storage, keys, refresh, transport })
    }

    /// Whether requests to `url` may carry the bearer token
    #[must_use]
    pub fn should_attach(&self, url: &str) -> bool {
        self.allowlist.iter().any(|re| re.is_match(url))
    }

    /// Last attachment decision, for diagnostics
    #[must_use]
    pub fn last_attachment(&self) -> AttachmentRecord {
        self.holder.last_attachment()
    }

    /// Send through the transport with authentication applied
    ///
    /// # Errors
    /// Only transport failures; HTTP error statuses come back as responses.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        if !self.should_attach(&request.url) {
            self.holder.record(AttachmentRecord::not_applicable(&request.url));
            return self.transport.send(request).await;
        }

        let Some(token) = self.current_token() else {
            debug!(url = %request.url, "no access token, sending unauthenticated");
            self.holder.record(AttachmentRecord::skipped(&request.url));
            return self.transport.send(request).await;
        };

        self.holder.record(AttachmentRecord::attached(&request.url, &token));
        let response = self.transport.send(request.with_bearer(&token)).await?;
        if response.status != 401 {
            return Ok(response);
        }

        info!(url = %request.url, "401 from resource server, refreshing");
        match self.refresh.refresh().await {
            Some(fresh) => {
                self.holder.record(AttachmentRecord::attached(&request.url, &fresh));
                self.transport.send(request.with_bearer(&fresh)).await
            }
            None => {
                warn!(url = %request.url, "refresh unavailable, returning 401");
                Ok(response)
            }
        }
    }

    fn current_token(&self) -> Option<String> {
        self.holder.token().or_else(|| match self.storage.read(&self.keys, TokenKind::AccessToken) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "access token unreadable");
                None
            }
        })
    }
}

#[async_trait]
impl HttpTransport for AuthInterceptor {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        AuthInterceptor::send(self, request).await
    }
}
