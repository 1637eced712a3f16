//! HTTP request handlers

use crate::{
    error::{ApiError, Result},
    models::{HealthResponse, InvalidationResponse, MeResponse},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::{header, Uri},
    response::IntoResponse,
    Extension, Json,
};
use cretoai_gatekeeper::{cache::roles_key, AccessGrant, BaseResponse};
use tracing::info;

/// Prometheus text exposition content type
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Guard metrics in Prometheus format
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.export_prometheus().await;
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// The authenticated caller and what admitted the request
pub async fn me(Extension(grant): Extension<AccessGrant>) -> Result<Json<BaseResponse<MeResponse>>> {
    let principal = grant
        .principal
        .ok_or_else(|| ApiError::Internal("protected route reached without a principal".to_string()))?;

    Ok(Json(BaseResponse::ok(MeResponse {
        subject_id: principal.subject_id,
        claims: principal.claims,
        roles: grant.roles,
        matched_pattern: grant.matched_pattern,
    })))
}

/// Drop one subject's cached role set
pub async fn invalidate_roles(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<BaseResponse<InvalidationResponse>>> {
    if subject.trim().is_empty() {
        return Err(ApiError::BadRequest("subject must not be empty".to_string()));
    }

    state.guard.roles().invalidate(&subject).await?;
    info!(subject = %subject, "Role cache invalidated");

    Ok(Json(BaseResponse::ok(InvalidationResponse {
        invalidated: roles_key(&subject),
        removed: None,
    })))
}

/// Drop the cached path policy and its compiled form
pub async fn invalidate_policies(
    State(state): State<AppState>,
) -> Result<Json<BaseResponse<InvalidationResponse>>> {
    state.guard.policy().invalidate().await?;

    Ok(Json(BaseResponse::ok(InvalidationResponse {
        invalidated: cretoai_gatekeeper::cache::ROLES_PATHS_KEY.to_string(),
        removed: None,
    })))
}

/// Drop every cached key starting with `prefix`
pub async fn invalidate_prefix(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Result<Json<BaseResponse<InvalidationResponse>>> {
    let removed = state.cache.invalidate_prefix(&prefix).await?;
    info!(prefix = %prefix, removed, "Cache prefix invalidated");

    Ok(Json(BaseResponse::ok(InvalidationResponse {
        invalidated: prefix,
        removed: Some(removed),
    })))
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
