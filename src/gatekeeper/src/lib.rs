//! # CretoAI Gatekeeper
//!
//! Request authorization engine: decides whether the bearer of a credential
//! may reach a resource path.
//!
//! ## Features
//!
//! - **Bearer token verification** (HMAC JWTs) into a [`Principal`]
//! - **Cache-aside role resolution** in front of a remote authority
//! - **Path policy** compiled from wildcard/parametrized specifications
//!   (`/roles/user/:id`, `/files/*.txt`)
//! - **Public route bypass** with handler-over-group precedence
//! - **Guard metrics** exported in Prometheus text format
//!
//! ## Example
//!
//! ```rust
//! use cretoai_gatekeeper::{
//!     AuthGuard, AuthorityConfig, Decision, DenyReason, GatekeeperConfig, GuardRequest,
//!     InMemoryCacheStore, RouteAccess, StaticAuthority, TokenVerifier,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cretoai_gatekeeper::Result<()> {
//!     let config = GatekeeperConfig {
//!         authority: AuthorityConfig::new("http://auth.internal", "service-token"),
//!         ..Default::default()
//!     };
//!
//!     let authority = Arc::new(StaticAuthority::new());
//!     let store = Arc::new(InMemoryCacheStore::new(&config.cache));
//!     let verifier = TokenVerifier::new("jwt-secret", &config.token)?;
//!     let guard = AuthGuard::from_config(&config, verifier, authority, store, None);
//!
//!     let health = GuardRequest::new(None, "/health", RouteAccess::public());
//!     assert_eq!(guard.decide(&health).await, Decision::Allow);
//!
//!     let anonymous = GuardRequest::new(None, "/api/users/42", RouteAccess::protected());
//!     assert_eq!(
//!         guard.decide(&anonymous).await,
//!         Decision::Deny(DenyReason::Unauthenticated)
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod metrics;
pub mod pattern;
pub mod resolver;
pub mod token;
pub mod types;

// Re-export commonly used types
pub use authority::{AuthorityClient, HttpAuthorityClient, RawPolicyTable, StaticAuthority, TokenSettings};
pub use cache::{CacheStore, CachingService, InMemoryCacheStore};
pub use config::{
    AuthorityConfig, CacheConfig, GatekeeperConfig, PatternConfig, RoleCacheConfig, TokenAlgorithm,
    TokenConfig, WildcardMode,
};
pub use envelope::BaseResponse;
pub use error::{AuthzError, Result};
pub use guard::{bootstrap, AccessGrant, AuthGuard, Denial, GuardRequest, GuardState};
pub use metrics::{GuardMetrics, GuardStats};
pub use pattern::{CompiledPattern, PatternCompiler};
pub use resolver::{PolicyResolver, PolicyTable, RoleResolver};
pub use token::{extract_bearer, TokenVerifier};
pub use types::{Decision, DenyReason, Principal, RoleSet, RouteAccess, Visibility};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
