//! Signed token fixtures

use authlab_common::jwt::{sign, Algorithm, SigningKey};
use serde_json::{json, Value};

/// HMAC secret behind every fixture token
pub const FIXTURE_SECRET: &str = "authlab-fixture-secret";

/// HS256 access token for `sub` with realm roles and an optional `exp`
pub fn access_token(sub: &str, exp: Option<i64>) -> String {
    let mut claims = json!({
        "iss": "https://localhost:8443/realms/news",
        "sub": sub,
        "aud": "news-api",
        "azp": "news-web",
        "preferred_username": sub,
        "realm_access": { "roles": ["user"] },
    });
    if let (Some(exp), Some(map)) = (exp, claims.as_object_mut()) {
        map.insert("exp".into(), json!(exp));
    }
    access_token_with(&claims)
}

/// HS256 token with arbitrary claims
pub fn access_token_with(claims: &Value) -> String {
    // HMAC signing with a non-empty secret has no failure path
    sign(claims, Algorithm::HS256, &SigningKey::secret(FIXTURE_SECRET))
        .expect("fixture token signing")
}
