//! Session, auth state and PKCE exchange records

use authlab_common::jwt::{decode_payload, expiry_of};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::impl_domain_status_conversions;
use crate::types::AuthMode;

/// Provider state machine phase
///
/// `anonymous → authorizing → exchanging → authenticated → expiring →
/// anonymous`; errors drop back to `anonymous` with a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authorizing,
    Exchanging,
    Authenticated,
    Expiring,
}

impl_domain_status_conversions!(AuthPhase {
    Anonymous => "anonymous",
    Authorizing => "authorizing",
    Exchanging => "exchanging",
    Authenticated => "authenticated",
    Expiring => "expiring",
});

/// Token material held by the active provider
///
/// The expiry and claims are always derived from the current access token;
/// [`Session::set_access_token`] re-derives both so they never go stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    /// Epoch seconds, from the access token's own `exp`
    pub access_token_exp: Option<i64>,
    pub refresh_token: Option<String>,
    pub claims: Option<Value>,
}

impl Session {
    /// Build from freshly issued tokens
    #[must_use]
    pub fn from_tokens(access_token: String, refresh_token: Option<String>) -> Self {
        let mut session = Self { refresh_token, ..Self::default() };
        session.set_access_token(access_token);
        session
    }

    /// Replace the access token and re-derive expiry and claims
    pub fn set_access_token(&mut self, access_token: String) {
        self.access_token_exp = expiry_of(&access_token);
        self.claims = decode_payload(&access_token);
        self.access_token = Some(access_token);
    }

    /// Drop the access token but keep the refresh token
    pub fn clear_access(&mut self) {
        self.access_token = None;
        self.access_token_exp = None;
        self.claims = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// True once `now_secs` reaches the expiry; no expiry means never
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.access_token.is_some() && self.access_token_exp.is_some_and(|exp| now_secs >= exp)
    }
}

/// Snapshot handed to subscribers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub phase: AuthPhase,
    pub logged_in: bool,
    pub access_token: Option<String>,
    pub access_token_exp: Option<i64>,
    pub token_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthState {
    /// Logged out, no error
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Logged out with a reason
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }

    /// Project a session into a snapshot
    #[must_use]
    pub fn from_session(session: &Session, phase: AuthPhase) -> Self {
        Self {
            phase,
            logged_in: session.is_authenticated(),
            access_token: session.access_token.clone(),
            access_token_exp: session.access_token_exp,
            token_payload: session.claims.clone(),
            error: None,
        }
    }

    /// Same state with a phase override
    #[must_use]
    pub fn in_phase(mut self, phase: AuthPhase) -> Self {
        self.phase = phase;
        self
    }
}

/// Form body sent to the token endpoint
///
/// `Debug` redacts secrets; the diagnostic snapshot uses [`Self::to_debug_value`].
#[derive(Clone, PartialEq, Eq)]
pub enum TokenRequest {
    AuthorizationCode {
        client_id: String,
        code: String,
        redirect_uri: String,
        code_verifier: String,
    },
    RefreshToken {
        client_id: String,
        refresh_token: String,
    },
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationCode { client_id, redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("client_id", client_id)
                .field("redirect_uri", redirect_uri)
                .finish_non_exhaustive(),
            Self::RefreshToken { client_id, .. } => {
                f.debug_struct("RefreshToken").field("client_id", client_id).finish_non_exhaustive()
            }
        }
    }
}

impl TokenRequest {
    /// `grant_type` value
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Ordered form fields
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::AuthorizationCode { client_id, code, redirect_uri, code_verifier } => vec![
                ("grant_type", self.grant_type()),
                ("client_id", client_id.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("code_verifier", code_verifier.as_str()),
            ],
            Self::RefreshToken { client_id, refresh_token } => vec![
                ("grant_type", self.grant_type()),
                ("client_id", client_id.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ],
        }
    }

    /// The request as shown in the debug panel
    #[must_use]
    pub fn to_debug_value(&self) -> Value {
        let fields: Map<String, Value> = self
            .form_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Value::Object(fields)
    }
}

/// Successful token endpoint response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Anything else the issuer sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    /// Minimal response carrying only tokens
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_in: None,
            token_type: Some("Bearer".to_string()),
            id_token: None,
            scope: None,
            extra: Map::new(),
        }
    }
}

/// PKCE material for the current authorization round-trip
///
/// Created at login, consumed once by the exchange, kept afterwards only for
/// diagnostics, cleared on logout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PkceExchangeState {
    pub code_verifier: Option<String>,
    pub code_challenge: Option<String>,
    pub authorization_url: Option<String>,
    pub last_token_request: Option<Value>,
    pub last_token_response: Option<Value>,
}

impl PkceExchangeState {
    /// Debug snapshot for `mode`
    #[must_use]
    pub fn debug_info(&self, mode: AuthMode) -> PkceDebugInfo {
        PkceDebugInfo {
            mode,
            verifier: self.code_verifier.clone(),
            challenge: self.code_challenge.clone(),
            challenge_method: self.code_challenge.as_ref().map(|_| "S256".to_string()),
            auth_url: self.authorization_url.clone(),
            token_request: self.last_token_request.clone(),
            token_response: self.last_token_response.clone(),
        }
    }
}

/// Diagnostic view of the PKCE exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkceDebugInfo {
    pub mode: AuthMode,
    pub verifier: Option<String>,
    pub challenge: Option<String>,
    /// `S256` once a challenge exists
    pub challenge_method: Option<String>,
    pub auth_url: Option<String>,
    pub token_request: Option<Value>,
    pub token_response: Option<Value>,
}

#[cfg(test)]
mod tests {
    use authlab_common::jwt::{sign, Algorithm, SigningKey};
    use serde_json::json;

    use super::*;

    fn token(exp: Option<i64>) -> String {
        let claims = match exp {
            Some(exp) => json!({"sub": "u", "exp": exp}),
            None => json!({"sub": "u"}),
        };
        sign(&claims, Algorithm::HS256, &SigningKey::secret("t")).unwrap()
    }

    #[test]
    fn expiry_tracks_current_token() {
        let mut session = Session::from_tokens(token(Some(100)), Some("r".into()));
        assert_eq!(session.access_token_exp, Some(100));

        session.set_access_token(token(None));
        assert_eq!(session.access_token_exp, None);
        assert!(!session.is_expired_at(i64::MAX));

        session.set_access_token(token(Some(50)));
        assert!(session.is_expired_at(50));
        assert!(!session.is_expired_at(49));
    }

    #[test]
    fn clear_access_keeps_refresh() {
        let mut session = Session::from_tokens(token(Some(100)), Some("r".into()));
        session.clear_access();
        assert!(!session.is_authenticated());
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
        assert!(session.claims.is_none());
    }

    #[test]
    fn auth_state_serializes_camel_case() {
        let session = Session::from_tokens(token(Some(7)), None);
        let state = AuthState::from_session(&session, AuthPhase::Authenticated);
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["loggedIn"], true);
        assert_eq!(value["accessTokenExp"], 7);
        assert_eq!(value["phase"], "authenticated");
        assert!(value.get("error").is_none());
        assert_eq!(AuthState::failed("boom").error.as_deref(), Some("boom"));
    }

    #[test]
    fn token_request_form_and_redaction() {
        let request = TokenRequest::AuthorizationCode {
            client_id: "news-web".into(),
            code: "abc".into(),
            redirect_uri: "https://localhost/".into(),
            code_verifier: "secret-verifier".into(),
        };
        assert_eq!(request.form_fields()[0], ("grant_type", "authorization_code"));
        assert_eq!(request.to_debug_value()["code_verifier"], "secret-verifier");
        assert!(!format!("{request:?}").contains("secret-verifier"));
    }

    #[test]
    fn token_response_keeps_unknown_fields() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "expires_in": 300,
            "session_state": "xyz",
        }))
        .unwrap();
        assert_eq!(response.expires_in, Some(300));
        assert!(response.refresh_token.is_none());
        assert_eq!(response.extra["session_state"], "xyz");
    }
}
