//! Error types used throughout the session layer
//!
//! Every failure is recoverable at session level: the provider reverts to an
//! anonymous state carrying the error's message. The variants follow the
//! recovery policy rather than the origin of the failure.

use authlab_common::error::{ErrorClassification, ErrorSeverity};
use authlab_common::storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for AuthLab
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AuthLabError {
    /// Local protocol violation (missing verifier, malformed response).
    /// Fails fast, never retried.
    #[error("{0}")]
    Protocol(String),

    /// Network or token-endpoint failure. Surfaced, not retried.
    #[error("{0}")]
    Transport(String),

    /// Resource server answered 401/403
    #[error("Authorization failed ({status}): {message}")]
    Authorization { status: u16, message: String },

    /// Cross-tab refresh coordination gave up
    #[error("Refresh coordination failed: {0}")]
    Coordination(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation needed an access token and none was present
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The selected auth mode has no implementation
    #[error("Auth mode \"{0}\" not implemented yet.")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for AuthLab operations
pub type Result<T> = std::result::Result<T, AuthLabError>;

impl AuthLabError {
    /// Token endpoint answered with a non-2xx status
    #[must_use]
    pub fn token_endpoint(status: u16, body: &str) -> Self {
        Self::Transport(format!("Token endpoint {status}: {body}"))
    }

    /// Whether this is an authorization rejection (401 or 403)
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization { .. })
    }
}

impl From<StorageError> for AuthLabError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AuthLabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("Invalid JSON: {err}"))
    }
}

impl ErrorClassification for AuthLabError {
    fn is_retryable(&self) -> bool {
        // Only authorization failures get the interceptor's single
        // refresh-and-retry cycle
        matches!(self, Self::Authorization { status: 401, .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotAuthenticated | Self::NotImplemented(_) => ErrorSeverity::Info,
            Self::Authorization { .. } | Self::Coordination(_) | Self::Transport(_) => {
                ErrorSeverity::Warning
            }
            Self::Protocol(_) | Self::Storage(_) | Self::Config(_) => ErrorSeverity::Error,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }
}
