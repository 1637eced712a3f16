//! Role resolution

use super::bounded_call;
use crate::authority::AuthorityClient;
use crate::cache::{roles_key, CachingService};
use crate::config::RoleCacheConfig;
use crate::error::Result;
use crate::metrics::{CacheKind, GuardMetrics};
use crate::types::RoleSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache-aside lookup of a subject's roles.
///
/// Never fails: an authority failure degrades to the empty role set, which
/// denies downstream. Failures are not cached, so the next request retries.
pub struct RoleResolver {
    authority: Arc<dyn AuthorityClient>,
    cache: CachingService,
    config: RoleCacheConfig,
    call_timeout: Duration,
    metrics: Option<Arc<GuardMetrics>>,
}

impl RoleResolver {
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        cache: CachingService,
        config: RoleCacheConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            authority,
            cache,
            config,
            call_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GuardMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn get_roles(&self, subject_id: &str) -> RoleSet {
        let key = roles_key(subject_id);

        if let Some(cached) = self.cache.get::<Vec<String>>(&key).await {
            if !(cached.is_empty() && self.config.refetch_empty) {
                self.record_cache(true).await;
                return RoleSet::from(cached);
            }
        }
        self.record_cache(false).await;

        let fetched = bounded_call(
            self.call_timeout,
            "role lookup",
            self.authority.fetch_user_roles(subject_id),
        )
        .await;

        match fetched {
            Ok(roles) => {
                debug!(subject = %subject_id, count = roles.len(), "Roles fetched from authority");
                self.cache.set(&key, &roles).await;
                RoleSet::from(roles)
            }
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Role lookup failed, continuing with no roles");
                if let Some(metrics) = &self.metrics {
                    metrics.record_authority_failure().await;
                }
                RoleSet::empty()
            }
        }
    }

    /// Drop the cached roles of one subject
    pub async fn invalidate(&self, subject_id: &str) -> Result<()> {
        self.cache.del(&roles_key(subject_id)).await
    }

    async fn record_cache(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache(CacheKind::Roles, hit).await;
        }
    }
}
