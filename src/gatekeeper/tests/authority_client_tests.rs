//! HTTP authority client against a mock authority

use cretoai_gatekeeper::{AuthorityClient, AuthorityConfig, AuthzError, HttpAuthorityClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_TOKEN: &str = "svc-token";

fn client(server: &MockServer) -> HttpAuthorityClient {
    HttpAuthorityClient::new(&AuthorityConfig::new(server.uri(), SERVICE_TOKEN)).unwrap()
}

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({ "responseCode": 200, "responseMessage": "Success", "responseData": data })
}

// ============================================================================
// ROLES
// ============================================================================

#[tokio::test]
async fn test_fetch_user_roles_sends_service_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/roles/user/42"))
        .and(header("authorization", "Bearer svc-token"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(["admin", "viewer"]))))
        .expect(1)
        .mount(&server)
        .await;

    let roles = client(&server).fetch_user_roles("42").await.unwrap();
    assert_eq!(roles, vec!["admin", "viewer"]);
}

#[tokio::test]
async fn test_null_role_data_is_empty() {
    let server = MockServer::start().await;
    Mock::given(path("/roles/user/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(null))))
        .mount(&server)
        .await;

    assert!(client(&server).fetch_user_roles("7").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subject_with_reserved_characters_stays_in_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/roles/user/a%2Fb%3Fc%23d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(["viewer"]))))
        .expect(1)
        .mount(&server)
        .await;

    let roles = client(&server).fetch_user_roles("a/b?c#d").await.unwrap();
    assert_eq!(roles, vec!["viewer"]);
}

// ============================================================================
// POLICY
// ============================================================================

#[tokio::test]
async fn test_fetch_role_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/roles/paths"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "admin": ["/api/users/*", "/roles/user/:id"],
            "viewer": ["/docs/*"]
        }))))
        .mount(&server)
        .await;

    let table = client(&server).fetch_role_paths().await.unwrap().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table["admin"], vec!["/api/users/*", "/roles/user/:id"]);
}

#[tokio::test]
async fn test_missing_policy_is_none() {
    let server = MockServer::start().await;
    Mock::given(path("/roles/paths"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseCode": 200 })))
        .mount(&server)
        .await;

    assert!(client(&server).fetch_role_paths().await.unwrap().is_none());
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_error_status_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(path("/roles/paths"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "responseCode": 503, "responseMessage": "down" })),
        )
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).fetch_role_paths().await,
        Err(AuthzError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn test_malformed_body_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(path("/roles/user/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).fetch_user_roles("1").await,
        Err(AuthzError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn test_slow_authority_times_out() {
    let server = MockServer::start().await;
    Mock::given(path("/roles/user/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!(["admin"])))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = AuthorityConfig::new(server.uri(), SERVICE_TOKEN);
    config.timeout = Duration::from_millis(50);
    let client = HttpAuthorityClient::new(&config).unwrap();

    assert!(matches!(
        client.fetch_user_roles("1").await,
        Err(AuthzError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_authority() {
    let client = HttpAuthorityClient::new(&AuthorityConfig::new("http://127.0.0.1:9", SERVICE_TOKEN)).unwrap();
    assert!(matches!(
        client.fetch_role_paths().await,
        Err(AuthzError::UpstreamUnavailable(_))
    ));
}

// ============================================================================
// TOKEN SETTINGS
// ============================================================================

#[tokio::test]
async fn test_fetch_token_settings() {
    let server = MockServer::start().await;
    Mock::given(path("/jwt/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "secret": "from-authority",
            "signOptions": { "expiresIn": "1d" }
        }))))
        .mount(&server)
        .await;

    let settings = client(&server).fetch_token_settings().await.unwrap();
    assert_eq!(settings.secret, "from-authority");
    assert_eq!(settings.sign_options.expires_in.as_deref(), Some("1d"));
}

#[tokio::test]
async fn test_empty_token_secret_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(path("/jwt/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "secret": "" }))))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).fetch_token_settings().await,
        Err(AuthzError::Config(_))
    ));
}
