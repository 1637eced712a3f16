use cretoai_gatekeeper::{AuthGuard, CachingService, GuardMetrics};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Request authorization guard
    pub guard: Arc<AuthGuard>,

    /// Cache used by the administration endpoints
    pub cache: CachingService,

    /// Guard metrics, rendered at `/metrics`
    pub metrics: Arc<GuardMetrics>,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(guard: AuthGuard, cache: CachingService, metrics: Arc<GuardMetrics>) -> Self {
        Self {
            guard: Arc::new(guard),
            cache,
            metrics,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
