//! Cache-aside resolvers for roles and the path policy

mod policy;
mod roles;

pub use policy::{PolicyResolver, PolicyTable};
pub use roles::RoleResolver;

use crate::error::{AuthzError, Result};
use std::future::Future;
use std::time::Duration;

/// Bound one authority call; a stalled call fails as `UpstreamUnavailable`
pub(crate) async fn bounded_call<T, F>(timeout: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut).await.unwrap_or_else(|_| {
        Err(AuthzError::UpstreamUnavailable(format!(
            "{} timed out after {:?}",
            what, timeout
        )))
    })
}
