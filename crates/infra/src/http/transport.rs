//! Resource API transport

use async_trait::async_trait;
use authlab_core::HttpTransport;
use authlab_domain::{ApiRequest, ApiResponse, AuthLabError, HttpMethod, Result};
use reqwest::Method;
use url::Url;

use super::HttpClient;
use crate::errors::InfraError;

/// [`HttpTransport`] backed by reqwest
///
/// Relative request URLs (`/api/rss`) resolve against `origin`, the way a
/// page's `fetch` resolves them against its own location.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
    origin: Option<Url>,
}

impl ReqwestTransport {
    pub fn new(http: HttpClient) -> Self {
        Self { http, origin: None }
    }

    /// Resolve relative URLs against `origin`
    ///
    /// # Errors
    /// [`AuthLabError::Config`] when `origin` is not an absolute URL.
    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|err| AuthLabError::Config(format!("invalid origin {origin}: {err}")))?;
        self.origin = Some(origin);
        Ok(self)
    }

    fn resolve(&self, raw: &str) -> Result<Url> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let origin = self.origin.as_ref().ok_or_else(|| {
                    AuthLabError::Config(format!("relative URL {raw} needs a transport origin"))
                })?;
                origin
                    .join(raw)
                    .map_err(|err| AuthLabError::Config(format!("invalid URL {raw}: {err}")))
            }
            Err(err) => Err(AuthLabError::Config(format!("invalid URL {raw}: {err}"))),
        }
    }
}

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.resolve(&request.url)?;
        let mut builder = self.http.request(method_of(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|err| AuthLabError::from(InfraError::from(err)))?;

        Ok(ApiResponse { status, headers, body })
    }
}
