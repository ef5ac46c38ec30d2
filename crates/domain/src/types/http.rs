//! Request/response values passed through the interceptor

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{AuthLabError, Result};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Outgoing request as seen by the interceptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Copy with `name` set to `value`, replacing any previous value
    #[must_use]
    pub fn with_header(&self, name: &str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        next.headers.push((name.to_string(), value.into()));
        next
    }

    /// Copy carrying `Authorization: Bearer <token>`
    #[must_use]
    pub fn with_bearer(&self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }
}

/// Response returned by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// JSON body with matching content type
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: value.to_string(),
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    /// [`AuthLabError::Protocol`] when the body is not JSON.
    pub fn body_json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// JSON body when the server says it is JSON, otherwise
    /// `{status, contentType, body}`
    #[must_use]
    pub fn normalized(&self) -> Value {
        if self.is_json() {
            if let Ok(value) = self.body_json() {
                return value;
            }
        }
        json!({
            "status": self.status,
            "contentType": self.content_type(),
            "body": self.body,
        })
    }

    /// `{status, body}` with the body parsed when possible
    #[must_use]
    pub fn status_and_body(&self) -> Value {
        let body = self.body_json().unwrap_or_else(|_| Value::String(self.body.clone()));
        json!({ "status": self.status, "body": body })
    }

    /// Fail on 401/403
    ///
    /// # Errors
    /// [`AuthLabError::Authorization`] for either status.
    pub fn error_for_authorization(self) -> Result<Self> {
        match self.status {
            401 | 403 => Err(AuthLabError::Authorization { status: self.status, message: self.body }),
            _ => Ok(self),
        }
    }
}

/// How the interceptor treated the last request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentOutcome {
    /// Bearer token attached
    Attached,
    /// In scope but no token was available
    #[default]
    Skipped,
    /// URL outside the allow-list
    NotApplicable,
}

/// Last credential attachment, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub url: Option<String>,
    pub token: Option<String>,
    pub outcome: AttachmentOutcome,
}

impl AttachmentRecord {
    pub fn attached(url: &str, token: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            token: Some(token.to_string()),
            outcome: AttachmentOutcome::Attached,
        }
    }

    pub fn skipped(url: &str) -> Self {
        Self { url: Some(url.to_string()), token: None, outcome: AttachmentOutcome::Skipped }
    }

    pub fn not_applicable(url: &str) -> Self {
        Self { url: Some(url.to_string()), token: None, outcome: AttachmentOutcome::NotApplicable }
    }

    #[must_use]
    pub fn was_attached(&self) -> bool {
        self.outcome == AttachmentOutcome::Attached
    }

    /// `Authorization: Bearer <token>` as it went on the wire
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Authorization: Bearer {t}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_replaces_existing_authorization() {
        let request = ApiRequest::get("/api/rss").with_header("authorization", "Basic x");
        let authed = request.with_bearer("abc");

        assert_eq!(authed.header("Authorization"), Some("Bearer abc"));
        assert_eq!(authed.headers.len(), 1);
        assert_eq!(request.header("Authorization"), Some("Basic x"));
    }

    /// Validates resource-call normalization.
    ///
    /// Assertions:
    /// - JSON content type yields the parsed body.
    /// - Anything else yields `{status, contentType, body}`.
    #[test]
    fn normalization() {
        let json_resp = ApiResponse::json(200, &json!({"valid": true}));
        assert_eq!(json_resp.normalized(), json!({"valid": true}));

        let mut text = ApiResponse::new(200, "<rss/>");
        text.headers.push(("Content-Type".into(), "application/rss+xml".into()));
        assert_eq!(
            text.normalized(),
            json!({"status": 200, "contentType": "application/rss+xml", "body": "<rss/>"})
        );

        let forbidden = ApiResponse::new(403, "forbidden");
        assert_eq!(forbidden.status_and_body(), json!({"status": 403, "body": "forbidden"}));
        assert!(forbidden.error_for_authorization().is_err());
    }

    #[test]
    fn attachment_record_header() {
        let record = AttachmentRecord::attached("/api/rss", "tok");
        assert!(record.was_attached());
        assert_eq!(record.authorization_header().as_deref(), Some("Authorization: Bearer tok"));
        assert!(AttachmentRecord::not_applicable("/x").authorization_header().is_none());
    }
}
