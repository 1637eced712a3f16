//! HTTP layer for the CretoAI gatekeeper
//!
//! Wires the [`AuthGuard`](cretoai_gatekeeper::AuthGuard) into an axum router:
//! every route carries visibility metadata and is authorized before its
//! handler runs.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, Result};
pub use routes::{create_router, RouteGroup};
pub use server::{Server, ServerConfig};
pub use state::AppState;
