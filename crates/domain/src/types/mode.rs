//! Provider modes, storage strategies and storage entry kinds

use serde::{Deserialize, Serialize};

use crate::constants::{PKCE_KEY_PREFIX, REFRESH_KEY_PREFIX, TOKEN_KEY_PREFIX};
use crate::impl_domain_status_conversions;

/// Which provider implementation drives the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthMode {
    /// Hand-written PKCE flow
    #[default]
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "oidc-client-ts")]
    OidcClientTs,
    #[serde(rename = "angular-auth-oidc-client")]
    AngularAuthOidcClient,
    #[serde(rename = "angular-oauth2-oidc")]
    AngularOauth2Oidc,
}

impl_domain_status_conversions!(AuthMode {
    Plain => "plain",
    OidcClientTs => "oidc-client-ts",
    AngularAuthOidcClient => "angular-auth-oidc-client",
    AngularOauth2Oidc => "angular-oauth2-oidc",
});

impl AuthMode {
    /// Every selectable mode, in menu order
    pub const ALL: [AuthMode; 4] =
        [Self::Plain, Self::OidcClientTs, Self::AngularAuthOidcClient, Self::AngularOauth2Oidc];

    /// Whether a working provider exists for this mode
    #[must_use]
    pub fn is_implemented(self) -> bool {
        matches!(self, Self::Plain)
    }
}

/// Backend that holds token material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStrategy {
    /// Lives only in the provider instance
    Memory,
    /// Per-tab store, survives reloads of the same tab
    #[default]
    Session,
    /// Shared across tabs and restarts
    #[serde(rename = "local")]
    Persistent,
}

impl_domain_status_conversions!(StorageStrategy {
    Memory => "memory",
    Session => "session",
    Persistent => "local",
});

/// Kind of per-session storage entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    PkceVerifier,
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    /// Every kind, used when migrating between strategies
    pub const ALL: [TokenKind; 3] = [Self::PkceVerifier, Self::AccessToken, Self::RefreshToken];

    /// Key prefix for this kind
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::PkceVerifier => PKCE_KEY_PREFIX,
            Self::AccessToken => TOKEN_KEY_PREFIX,
            Self::RefreshToken => REFRESH_KEY_PREFIX,
        }
    }

    /// `{prefix}:{realm}:{client_id}`
    #[must_use]
    pub fn key(self, realm: &str, client_id: &str) -> String {
        format!("{}:{realm}:{client_id}", self.prefix())
    }
}
