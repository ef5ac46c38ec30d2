//! Claim normalization and local validation checks

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode::decode_payload;

/// Claims the session layer cares about, in a fixed shape
///
/// `audience` is always a list (a string `aud` becomes a one-element list).
/// `roles` come from the first location present: `realm_access.roles`, then
/// top-level `roles`, then `resource_access.<client>.roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedClaims {
    /// `iss`
    pub issuer: Option<String>,
    /// `sub`
    pub subject: Option<String>,
    /// `aud`, normalized to a list
    pub audience: Vec<String>,
    /// `azp`
    pub authorized_party: Option<String>,
    /// `preferred_username`
    pub username: Option<String>,
    /// Roles from the first populated location
    pub roles: Vec<String>,
    /// `exp` in epoch seconds
    pub expires_at: Option<i64>,
    /// `iat` in epoch seconds
    pub issued_at: Option<i64>,
}

impl NormalizedClaims {
    /// Normalize a decoded payload
    ///
    /// `client_id` picks the `resource_access` entry; when absent the token's
    /// own `azp` is used.
    #[must_use]
    pub fn from_payload(payload: &Value, client_id: Option<&str>) -> Self {
        let authorized_party = string_claim(payload, "azp");
        let client = client_id.map(str::to_string).or_else(|| authorized_party.clone());

        Self {
            issuer: string_claim(payload, "iss"),
            subject: string_claim(payload, "sub"),
            audience: audience_of(payload),
            authorized_party,
            username: string_claim(payload, "preferred_username"),
            roles: roles_of(payload, client.as_deref()),
            expires_at: epoch_claim(payload, "exp"),
            issued_at: epoch_claim(payload, "iat"),
        }
    }

    /// Decode a token and normalize its payload
    #[must_use]
    pub fn from_token(token: &str, client_id: Option<&str>) -> Option<Self> {
        decode_payload(token).map(|payload| Self::from_payload(&payload, client_id))
    }

    /// True once `now_secs` has reached `exp`; tokens without `exp` never expire
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expires_at.is_some_and(|exp| now_secs >= exp)
    }

    /// Whether `role` appears in the normalized role list
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Expiry of a token in epoch seconds, read from its own `exp` claim
#[must_use]
pub fn expiry_of(token: &str) -> Option<i64> {
    decode_payload(token).and_then(|payload| epoch_claim(&payload, "exp"))
}

fn string_claim(payload: &Value, name: &str) -> Option<String> {
    payload.get(name).and_then(Value::as_str).map(str::to_string)
}

fn epoch_claim(payload: &Value, name: &str) -> Option<i64> {
    let value = payload.get(name)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

fn audience_of(payload: &Value) -> Vec<String> {
    match payload.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(items)) => {
            items.iter().filter_map(Value::as_str).map(str::to_string).collect()
        }
        _ => Vec::new(),
    }
}

fn roles_of(payload: &Value, client: Option<&str>) -> Vec<String> {
    let candidates = [
        payload.pointer("/realm_access/roles"),
        payload.get("roles"),
        client.and_then(|c| payload.get("resource_access")?.get(c)?.get("roles")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Local issuer/audience/expiry checks on decoded claims
///
/// Mirrors the report the resource server's validate endpoint produces, so a
/// client can explain why a token would be rejected without a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimChecks {
    /// Required `iss`, if any
    pub issuer: Option<String>,
    /// Audience that must appear in `aud` (or match `azp`), if any
    pub audience: Option<String>,
    /// Seconds of clock skew tolerated on `exp`
    pub leeway_secs: i64,
}

/// Outcome of [`ClaimChecks::evaluate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    /// All checks passed
    pub valid: bool,
    /// Issuer matched or was not required
    pub issuer_ok: bool,
    /// Audience matched or was not required
    pub audience_ok: bool,
    /// Token not yet expired (or carries no `exp`)
    pub not_expired: bool,
    /// One line per failed check
    pub problems: Vec<String>,
}

impl ClaimChecks {
    /// Require an issuer
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require an audience
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Tolerate clock skew
    #[must_use]
    pub fn with_leeway(mut self, leeway_secs: i64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Evaluate claims at `now_secs`
    #[must_use]
    pub fn evaluate(&self, claims: &NormalizedClaims, now_secs: i64) -> ClaimReport {
        let mut problems = Vec::new();

        let issuer_ok = match &self.issuer {
            Some(expected) => claims.issuer.as_deref() == Some(expected.as_str()),
            None => true,
        };
        if !issuer_ok {
            problems.push(format!(
                "issuer mismatch: expected {}, got {}",
                self.issuer.as_deref().unwrap_or_default(),
                claims.issuer.as_deref().unwrap_or("<none>")
            ));
        }

        let audience_ok = match &self.audience {
            Some(expected) => {
                claims.audience.iter().any(|a| a == expected)
                    || claims.authorized_party.as_deref() == Some(expected.as_str())
            }
            None => true,
        };
        if !audience_ok {
            problems.push(format!(
                "audience {} not present",
                self.audience.as_deref().unwrap_or_default()
            ));
        }

        let not_expired = !claims.is_expired_at(now_secs - self.leeway_secs);
        if !not_expired {
            problems.push("token expired".to_string());
        }

        ClaimReport {
            valid: problems.is_empty(),
            issuer_ok,
            audience_ok,
            not_expired,
            problems,
        }
    }
}
