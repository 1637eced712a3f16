//! Router integration tests
//!
//! Every request goes through the full axum stack with an in-memory
//! authority behind the guard.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    routing::get,
    Router,
};
use cretoai_gatekeeper::{
    AuthGuard, AuthorityConfig, CachingService, GatekeeperConfig, GuardMetrics, InMemoryCacheStore,
    RawPolicyTable, StaticAuthority, TokenVerifier,
};
use cretoai_gatekeeper_api::{create_router, middleware::X_REQUEST_ID, AppState, RouteGroup};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

const SECRET: &str = "router-test-secret";

fn bearer(subject: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
    let token = jsonwebtoken::encode(
        &Header::default(),
        &json!({ "sub": subject, "username": format!("user-{}", subject), "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

fn policy(entries: &[(&str, &[&str])]) -> RawPolicyTable {
    entries
        .iter()
        .map(|(role, sources)| (role.to_string(), sources.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn default_policy() -> RawPolicyTable {
    policy(&[("admin", &["/api/*", "/admin/*"]), ("viewer", &["/api/me"])])
}

struct TestApp {
    router: Router,
    state: AppState,
    authority: Arc<StaticAuthority>,
}

impl TestApp {
    fn new(policy: RawPolicyTable) -> Self {
        let authority = Arc::new(
            StaticAuthority::new()
                .with_roles("1", ["admin"])
                .with_roles("2", ["viewer"])
                .with_policy(policy),
        );

        let config = GatekeeperConfig {
            authority: AuthorityConfig::new("http://authority.test", "service-token"),
            ..Default::default()
        };
        let store = Arc::new(InMemoryCacheStore::new(&config.cache));
        let metrics = Arc::new(GuardMetrics::new());
        let verifier = TokenVerifier::new(SECRET, &config.token).unwrap();
        let guard = AuthGuard::from_config(
            &config,
            verifier,
            authority.clone(),
            store.clone(),
            Some(metrics.clone()),
        );
        let state = AppState::new(guard, CachingService::new(store, &config.cache), metrics);

        Self {
            router: create_router(state.clone()),
            state,
            authority,
        }
    }

    async fn send(&self, method: Method, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, authorization).await
    }

    async fn delete(&self, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, authorization).await
    }
}

// ============================================================================
// Public routes
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new(default_policy());

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(app.authority.role_calls(), 0);
}

#[tokio::test]
async fn test_metrics_is_public_and_prometheus_formatted() {
    let app = TestApp::new(default_policy());
    app.get("/health", None).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("gatekeeper_decisions_total"));
    assert!(text.contains("gatekeeper_public_bypass_total"));
}

// ============================================================================
// Protected routes
// ============================================================================

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::new(default_policy());

    let (status, body) = app.get("/api/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "responseCode": 401, "responseMessage": "Unauthorized", "responseData": "/api/me" })
    );
}

#[tokio::test]
async fn test_protected_route_with_forged_token() {
    let app = TestApp::new(default_policy());
    let forged = bearer("1").replace('.', ".x");

    let (status, body) = app.get("/api/me", Some(&forged)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["responseData"], "/api/me");
    assert_eq!(app.authority.role_calls(), 0);
}

#[tokio::test]
async fn test_me_echoes_principal() {
    let app = TestApp::new(default_policy());

    let (status, body) = app.get("/api/me", Some(&bearer("2"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseCode"], 200);
    assert_eq!(body["responseMessage"], "Success");

    let data = &body["responseData"];
    assert_eq!(data["subjectId"], "2");
    assert_eq!(data["claims"]["username"], "user-2");
    assert_eq!(data["roles"], json!(["viewer"]));
    assert_eq!(data["matchedPattern"], "/api/me");
}

#[tokio::test]
async fn test_path_outside_policy_is_denied() {
    let app = TestApp::new(default_policy());

    let (status, body) = app.delete("/admin/cache/policies", Some(&bearer("2"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["responseMessage"], "You are not allowed to access this path");
    assert_eq!(body["responseData"], "/admin/cache/policies");
}

#[tokio::test]
async fn test_subject_without_roles_is_denied() {
    let app = TestApp::new(default_policy());

    let (status, _) = app.get("/api/me", Some(&bearer("3"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_handler_tag_overrides_group_tag() {
    let app = TestApp::new(default_policy());

    let router = RouteGroup::protected()
        .public_route("/open", get(|| async { "open" }))
        .route("/closed", get(|| async { "closed" }))
        .into_router(app.state.guard.clone())
        .with_state(app.state.clone());

    let open = router
        .clone()
        .oneshot(Request::builder().uri("/open").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(open.status(), StatusCode::OK);

    let closed = router
        .oneshot(Request::builder().uri("/closed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(closed.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Cache administration
// ============================================================================

#[tokio::test]
async fn test_invalidate_roles_forces_refetch() {
    let app = TestApp::new(default_policy());
    let admin = bearer("1");

    app.get("/api/me", Some(&admin)).await;
    assert_eq!(app.authority.role_calls(), 1);

    let (status, body) = app.delete("/admin/cache/roles/1", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseData"]["invalidated"], "ROLES_1");
    assert_eq!(app.authority.role_calls(), 1);

    app.get("/api/me", Some(&admin)).await;
    assert_eq!(app.authority.role_calls(), 2);
}

#[tokio::test]
async fn test_invalidate_policies_picks_up_new_policy() {
    let app = TestApp::new(policy(&[
        ("admin", &["/api/*", "/admin/*"]),
        ("viewer", &["/api/profile"]),
    ]));
    let viewer = bearer("2");

    let (status, _) = app.get("/api/me", Some(&viewer)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.authority.set_policy(Some(default_policy()));
    let (status, _) = app.get("/api/me", Some(&viewer)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "cached policy still applies");

    let (status, body) = app.delete("/admin/cache/policies", Some(&bearer("1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseData"]["invalidated"], "ROLES_PATHS");

    let (status, _) = app.get("/api/me", Some(&viewer)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalidate_prefix_reports_removed_keys() {
    let app = TestApp::new(default_policy());
    let admin = bearer("1");

    app.get("/api/me", Some(&admin)).await;

    let (status, body) = app.delete("/admin/cache/prefix/ROLES_", Some(&admin)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseData"]["invalidated"], "ROLES_");
    assert_eq!(body["responseData"]["removed"], 2);

    app.get("/api/me", Some(&admin)).await;
    assert_eq!(app.authority.role_calls(), 2);
    assert_eq!(app.authority.policy_calls(), 2);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = TestApp::new(default_policy());

    let (status, _) = app.delete("/admin/cache/policies", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.authority.policy_calls(), 0);
}

// ============================================================================
// Plumbing
// ============================================================================

#[tokio::test]
async fn test_request_id_header_present() {
    let app = TestApp::new(default_policy());

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key(X_REQUEST_ID));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = TestApp::new(default_policy());

    let (status, body) = app.get("/nowhere", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["responseCode"], 404);
    assert_eq!(body["responseData"], "/nowhere");
}
