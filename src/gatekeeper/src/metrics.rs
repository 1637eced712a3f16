//! Guard metrics with Prometheus text export

use crate::types::{Decision, DenyReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of guard counters
#[derive(Debug, Clone, Default)]
pub struct GuardStats {
    /// Decisions made (bypasses included)
    pub total_decisions: u64,
    pub allowed: u64,
    pub denied: u64,

    /// Requests let through by the public-route bypass
    pub public_bypass: u64,

    pub denied_unauthenticated: u64,
    pub denied_unauthorized: u64,

    pub role_cache_hits: u64,
    pub role_cache_misses: u64,
    pub policy_cache_hits: u64,
    pub policy_cache_misses: u64,

    /// Authority calls that failed or timed out
    pub authority_failures: u64,

    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl GuardStats {
    pub fn role_hit_rate(&self) -> f64 {
        ratio(self.role_cache_hits, self.role_cache_hits + self.role_cache_misses)
    }

    pub fn policy_hit_rate(&self) -> f64 {
        ratio(self.policy_cache_hits, self.policy_cache_hits + self.policy_cache_misses)
    }

    pub fn allow_rate(&self) -> f64 {
        ratio(self.allowed, self.allowed + self.denied)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Which cache-aside lookup a hit or miss belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Roles,
    Policy,
}

/// Shared metrics sink for the guard and resolvers
pub struct GuardMetrics {
    stats: Arc<RwLock<GuardStats>>,

    /// Latency samples (ring buffer)
    latency_samples: Arc<RwLock<Vec<f64>>>,
    max_samples: usize,
}

impl GuardMetrics {
    pub fn new() -> Self {
        Self::with_max_samples(10_000)
    }

    pub fn with_max_samples(max_samples: usize) -> Self {
        let max_samples = max_samples.max(10);
        Self {
            stats: Arc::new(RwLock::new(GuardStats::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(max_samples))),
            max_samples,
        }
    }

    pub async fn record_decision(&self, decision: Decision) {
        let mut stats = self.stats.write().await;
        stats.total_decisions += 1;

        match decision {
            Decision::Allow => stats.allowed += 1,
            Decision::Deny(reason) => {
                stats.denied += 1;
                match reason {
                    DenyReason::Unauthenticated => stats.denied_unauthenticated += 1,
                    DenyReason::Unauthorized => stats.denied_unauthorized += 1,
                }
            }
        }
    }

    pub async fn record_public_bypass(&self) {
        let mut stats = self.stats.write().await;
        stats.public_bypass += 1;
    }

    pub async fn record_cache(&self, kind: CacheKind, hit: bool) {
        let mut stats = self.stats.write().await;
        match (kind, hit) {
            (CacheKind::Roles, true) => stats.role_cache_hits += 1,
            (CacheKind::Roles, false) => stats.role_cache_misses += 1,
            (CacheKind::Policy, true) => stats.policy_cache_hits += 1,
            (CacheKind::Policy, false) => stats.policy_cache_misses += 1,
        }
    }

    pub async fn record_authority_failure(&self) {
        let mut stats = self.stats.write().await;
        stats.authority_failures += 1;
    }

    /// Appends one sample; percentiles are derived when stats are read.
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.write().await;
        samples.push(latency_ms);

        if samples.len() > self.max_samples {
            let drop_count = self.max_samples / 10;
            samples.drain(0..drop_count);
        }
    }

    pub async fn snapshot(&self) -> GuardStats {
        let mut stats = self.stats.read().await.clone();

        let mut sorted = self.latency_samples.read().await.clone();
        if !sorted.is_empty() {
            sorted.sort_by(f64::total_cmp);
            stats.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            stats.latency_p50_ms = percentile(&sorted, 0.50);
            stats.latency_p90_ms = percentile(&sorted, 0.90);
            stats.latency_p99_ms = percentile(&sorted, 0.99);
        }

        stats
    }

    pub async fn reset(&self) {
        *self.stats.write().await = GuardStats::default();
        self.latency_samples.write().await.clear();
    }

    /// Prometheus text exposition
    pub async fn export_prometheus(&self) -> String {
        let stats = self.snapshot().await;

        format!(
            r#"# HELP gatekeeper_decisions_total Authorization decisions
# TYPE gatekeeper_decisions_total counter
gatekeeper_decisions_total {}

# HELP gatekeeper_allowed_total Allowed requests
# TYPE gatekeeper_allowed_total counter
gatekeeper_allowed_total {}

# HELP gatekeeper_denied_total Denied requests by reason
# TYPE gatekeeper_denied_total counter
gatekeeper_denied_total{{reason="unauthenticated"}} {}
gatekeeper_denied_total{{reason="unauthorized"}} {}

# HELP gatekeeper_public_bypass_total Requests to public routes
# TYPE gatekeeper_public_bypass_total counter
gatekeeper_public_bypass_total {}

# HELP gatekeeper_cache_hits_total Cache-aside hits
# TYPE gatekeeper_cache_hits_total counter
gatekeeper_cache_hits_total{{cache="roles"}} {}
gatekeeper_cache_hits_total{{cache="policy"}} {}

# HELP gatekeeper_cache_misses_total Cache-aside misses
# TYPE gatekeeper_cache_misses_total counter
gatekeeper_cache_misses_total{{cache="roles"}} {}
gatekeeper_cache_misses_total{{cache="policy"}} {}

# HELP gatekeeper_authority_failures_total Failed authority calls
# TYPE gatekeeper_authority_failures_total counter
gatekeeper_authority_failures_total {}

# HELP gatekeeper_latency_seconds Guard latency percentiles
# TYPE gatekeeper_latency_seconds summary
gatekeeper_latency_seconds{{quantile="0.5"}} {}
gatekeeper_latency_seconds{{quantile="0.9"}} {}
gatekeeper_latency_seconds{{quantile="0.99"}} {}
"#,
            stats.total_decisions,
            stats.allowed,
            stats.denied_unauthenticated,
            stats.denied_unauthorized,
            stats.public_bypass,
            stats.role_cache_hits,
            stats.policy_cache_hits,
            stats.role_cache_misses,
            stats.policy_cache_misses,
            stats.authority_failures,
            stats.latency_p50_ms / 1000.0,
            stats.latency_p90_ms / 1000.0,
            stats.latency_p99_ms / 1000.0,
        )
    }
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}
