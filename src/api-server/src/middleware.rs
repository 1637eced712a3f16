//! Middleware layer for the API server
//!
//! This module provides middleware components for:
//! - Route authorization through the gatekeeper guard
//! - Request logging and tracing
//! - CORS configuration
//! - Request ID tracking

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use cretoai_gatekeeper::{AuthGuard, GuardRequest, RouteAccess};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Configure CORS middleware
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
        ])
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Request ID middleware
///
/// Generates or extracts a unique request ID and echoes it in the response
/// headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    response.headers_mut().insert(
        X_REQUEST_ID,
        HeaderValue::from_str(&request_id.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("invalid-uuid")),
    );

    response
}

/// Request logging middleware
///
/// Logs method, URI, status and duration; the level follows the status class.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status();
    match status.as_u16() {
        500..=599 => tracing::error!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
        400..=499 => tracing::warn!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
        _ => tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
    }

    response
}

/// Guard bound to one route's visibility metadata
#[derive(Clone)]
pub struct RouteGuard {
    pub guard: Arc<AuthGuard>,
    pub access: RouteAccess,
}

impl RouteGuard {
    pub fn new(guard: Arc<AuthGuard>, access: RouteAccess) -> Self {
        Self { guard, access }
    }
}

/// Authorization middleware
///
/// Runs the guard for the matched route. On allow the [`AccessGrant`] is
/// stored in the request extensions for the handler; on deny the request
/// never reaches the handler.
///
/// [`AccessGrant`]: cretoai_gatekeeper::AccessGrant
pub async fn authz_middleware(
    State(route): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let guard_request = GuardRequest::new(authorization.as_deref(), &path, route.access);
    let grant = route
        .guard
        .authorize(&guard_request)
        .await
        .map_err(|denial| ApiError::Denied {
            denial,
            path: path.clone(),
        })?;

    request.extensions_mut().insert(grant);
    Ok(next.run(request).await)
}
