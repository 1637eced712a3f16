//! Route definitions for the API server
//!
//! Routes are declared in groups. A group carries a visibility tag, and any
//! route may override it with its own; the guard resolves the two with the
//! handler tag taking precedence. Every route runs behind
//! [`authz_middleware`](crate::middleware::authz_middleware), public ones
//! included, so public bypasses are counted like any other decision.
//!
//! - System endpoints (public): health and metrics
//! - API endpoints (protected): caller introspection
//! - Admin endpoints (protected): cache invalidation

use crate::{
    handlers,
    middleware::{self, RouteGuard},
    state::AppState,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, MethodRouter},
    Router,
};
use cretoai_gatekeeper::{AuthGuard, RouteAccess, Visibility};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Routes sharing a group-level visibility tag
pub struct RouteGroup {
    visibility: Option<Visibility>,
    routes: Vec<(String, MethodRouter<AppState>, Option<Visibility>)>,
}

impl RouteGroup {
    /// Group without a tag; its routes are protected unless they say otherwise
    pub fn new() -> Self {
        Self {
            visibility: None,
            routes: Vec::new(),
        }
    }

    pub fn public() -> Self {
        Self {
            visibility: Some(Visibility::Public),
            routes: Vec::new(),
        }
    }

    pub fn protected() -> Self {
        Self {
            visibility: Some(Visibility::Protected),
            routes: Vec::new(),
        }
    }

    /// Add a route that inherits the group tag
    pub fn route(self, path: &str, method_router: MethodRouter<AppState>) -> Self {
        self.route_with(path, method_router, None)
    }

    /// Add a route tagged public at handler level
    pub fn public_route(self, path: &str, method_router: MethodRouter<AppState>) -> Self {
        self.route_with(path, method_router, Some(Visibility::Public))
    }

    /// Add a route tagged protected at handler level
    pub fn protected_route(self, path: &str, method_router: MethodRouter<AppState>) -> Self {
        self.route_with(path, method_router, Some(Visibility::Protected))
    }

    pub fn route_with(
        mut self,
        path: &str,
        method_router: MethodRouter<AppState>,
        handler: Option<Visibility>,
    ) -> Self {
        self.routes.push((path.to_string(), method_router, handler));
        self
    }

    /// Access metadata every route of this group would get
    pub fn access_for(&self, handler: Option<Visibility>) -> RouteAccess {
        RouteAccess {
            handler,
            group: self.visibility,
        }
    }

    /// Attach the guard to every route and build the router
    pub fn into_router(self, guard: Arc<AuthGuard>) -> Router<AppState> {
        let group = self.visibility;

        self.routes
            .into_iter()
            .fold(Router::new(), |router, (path, method_router, handler)| {
                let route = RouteGuard::new(guard.clone(), RouteAccess { handler, group });
                router.route(
                    &path,
                    method_router.route_layer(axum_middleware::from_fn_with_state(
                        route,
                        middleware::authz_middleware,
                    )),
                )
            })
    }
}

impl Default for RouteGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let guard = state.guard.clone();

    let system = RouteGroup::public()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics));

    let api = RouteGroup::protected().route("/api/me", get(handlers::me));

    let admin = RouteGroup::protected()
        .route("/admin/cache/roles/:subject", delete(handlers::invalidate_roles))
        .route("/admin/cache/policies", delete(handlers::invalidate_policies))
        .route("/admin/cache/prefix/:prefix", delete(handlers::invalidate_prefix));

    Router::new()
        .merge(system.into_router(guard.clone()))
        .merge(api.into_router(guard.clone()))
        .merge(admin.into_router(guard))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}
