//! Session manager over the reqwest adapters against a stubbed Keycloak and
//! resource API.

use std::sync::Arc;
use std::time::Duration;

use authlab_common::time::Clock;
use authlab_core::testing::{access_token, RecordingNavigator};
use authlab_core::{Browser, SessionKeys, SessionManager, SessionPorts, Tab};
use authlab_domain::{AttachmentOutcome, AuthLabError, AuthPhase, Config, TokenKind};
use authlab_infra::{HttpClient, KeycloakTokenClient, ReqwestTransport};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME_URL: &str = "https://localhost/";
const TOKEN_PATH: &str = "/realms/news/protocol/openid-connect/token";

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.auth.kc_base = server.uri();
    config.api.base_url = server.uri();
    config.api.allowlist = vec![format!("^{}/api/", server.uri().replace('.', "\\."))];
    config
}

fn manager(tab: Tab, config: &Config, navigator: Arc<RecordingNavigator>) -> SessionManager {
    let http = HttpClient::new().expect("http client");
    let ports = SessionPorts {
        endpoint: Arc::new(KeycloakTokenClient::new(http.clone())),
        transport: Arc::new(ReqwestTransport::new(http)),
        navigator,
    };
    SessionManager::new(tab, config.clone(), ports).expect("session manager")
}

fn token_reply(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": 300,
    }))
}

/// Validates the authorization-code round-trip over HTTP.
///
/// Assertions:
/// - The code and stored verifier reach the token endpoint as a form post.
/// - Resource calls carry the issued token.
#[tokio::test]
async fn login_exchange_and_resource_call() {
    let server = MockServer::start().await;
    let browser = Browser::new();
    let access = access_token("alice", Some(browser.clock().now_secs() + 300));

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("code_verifier="))
        .respond_with(token_reply(&access, "r1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rss"))
        .and(header("authorization", format!("Bearer {access}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<rss/>", "application/rss+xml"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let tab = browser.open_tab();
    let navigator = Arc::new(RecordingNavigator::new(HOME_URL));

    let first = manager(tab.clone(), &config, navigator.clone());
    first.init().await;
    first.login().await.unwrap();
    let redirect = navigator.last_redirect().unwrap();
    assert!(redirect.starts_with(&format!("{}/realms/news/protocol/openid-connect/auth?", server.uri())));
    first.shutdown();

    navigator.set_url("https://localhost/?state=s&code=abc");
    let second = manager(tab.reload(), &config, navigator.clone());
    let state = second.init().await;

    assert!(state.logged_in, "error: {:?}", state.error);
    assert_eq!(state.phase, AuthPhase::Authenticated);
    assert_eq!(state.access_token.as_deref(), Some(access.as_str()));

    let rss = second.fetch_rss().await.unwrap();
    assert_eq!(rss, json!({"status": 200, "contentType": "application/rss+xml", "body": "<rss/>"}));
    assert_eq!(second.interceptor().last_attachment().outcome, AttachmentOutcome::Attached);
    second.shutdown();
}

/// Validates 401 recovery over HTTP.
///
/// Assertions:
/// - One refresh grant is posted with the stored refresh token.
/// - The request is retried once with the new token.
/// - The rotated refresh token replaces the old one.
#[tokio::test]
async fn unauthorized_call_refreshes_and_retries() {
    let server = MockServer::start().await;
    let browser = Browser::new();
    let now = browser.clock().now_secs();
    let stale = access_token("alice", Some(now + 300));
    let fresh = access_token("alice", Some(now + 600));

    Mock::given(method("GET"))
        .and(path("/api/token/validate"))
        .and(header("authorization", format!("Bearer {stale}").as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/token/validate"))
        .and(header("authorization", format!("Bearer {fresh}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(token_reply(&fresh, "r2"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let keys = SessionKeys::from_config(&config.auth);
    let session = manager(browser.open_tab(), &config, Arc::new(RecordingNavigator::new(HOME_URL)));
    session.storage().write(&keys, TokenKind::AccessToken, &stale).unwrap();
    session.storage().write(&keys, TokenKind::RefreshToken, "r1").unwrap();
    assert!(session.init().await.logged_in);

    let body = session.validate_token().await.unwrap();
    assert_eq!(body, json!({"valid": true}));

    assert_eq!(session.storage().read(&keys, TokenKind::AccessToken).unwrap(), Some(fresh.clone()));
    assert_eq!(session.storage().read(&keys, TokenKind::RefreshToken).unwrap().as_deref(), Some("r2"));

    let mut rx = session.subscribe();
    let adopted = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if rx.borrow_and_update().access_token.as_deref() == Some(fresh.as_str()) {
                return;
            }
            rx.changed().await.unwrap();
        }
    })
    .await;
    assert!(adopted.is_ok(), "provider did not adopt the refreshed token");
    session.shutdown();
}

#[tokio::test]
async fn rejected_refresh_surfaces_original_401() {
    let server = MockServer::start().await;
    let browser = Browser::new();
    let stale = access_token("alice", Some(browser.clock().now_secs() + 300));

    Mock::given(method("GET"))
        .and(path("/api/rss"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let keys = SessionKeys::from_config(&config.auth);
    let session = manager(browser.open_tab(), &config, Arc::new(RecordingNavigator::new(HOME_URL)));
    session.storage().write(&keys, TokenKind::AccessToken, &stale).unwrap();
    session.storage().write(&keys, TokenKind::RefreshToken, "revoked").unwrap();
    session.init().await;

    let err = session.fetch_rss().await.unwrap_err();
    assert_eq!(err, AuthLabError::Authorization { status: 401, message: "expired".into() });
    assert_eq!(session.storage().read(&keys, TokenKind::AccessToken).unwrap(), Some(stale));
    session.shutdown();
}
