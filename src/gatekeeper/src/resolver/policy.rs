//! Path policy resolution

use super::bounded_call;
use crate::authority::{AuthorityClient, RawPolicyTable};
use crate::cache::{CachingService, ROLES_PATHS_KEY};
use crate::error::{AuthzError, Result};
use crate::metrics::{CacheKind, GuardMetrics};
use crate::pattern::{CompiledPattern, PatternCompiler};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fingerprint of a raw policy table
type Fingerprint = [u8; 32];

/// Role name → compiled path patterns.
///
/// Treated as one unit; it is replaced whole, never edited per role.
#[derive(Debug, Default)]
pub struct PolicyTable {
    entries: HashMap<String, Vec<CompiledPattern>>,
    fingerprint: Fingerprint,
}

impl PolicyTable {
    /// Compile a raw table, dropping specifications that fail to compile
    pub fn compile(raw: &RawPolicyTable, compiler: &PatternCompiler) -> Self {
        let entries = raw
            .iter()
            .map(|(role, sources)| (role.clone(), compiler.compile_all(sources)))
            .collect();

        let mut table = Self {
            entries,
            fingerprint: Fingerprint::default(),
        };
        // Keyed by what survived, which is also what gets cached
        table.fingerprint = fingerprint(&table.to_source());
        table
    }

    pub fn patterns_for(&self, role: &str) -> Option<&[CompiledPattern]> {
        self.entries.get(role).map(Vec::as_slice)
    }

    pub fn roles(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Number of roles with an entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pattern_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Source form of the patterns that survived compilation
    pub fn to_source(&self) -> RawPolicyTable {
        self.entries
            .iter()
            .map(|(role, patterns)| {
                (
                    role.clone(),
                    patterns.iter().map(|p| p.source().to_string()).collect(),
                )
            })
            .collect()
    }
}

/// blake3 over the sorted raw table
fn fingerprint(raw: &RawPolicyTable) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    for (role, sources) in raw {
        hasher.update(role.as_bytes());
        hasher.update(&[0]);
        for source in sources {
            hasher.update(source.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(&[0xff]);
    }
    *hasher.finalize().as_bytes()
}

/// Cache-aside lookup of the global path policy.
///
/// The source form lives in the cache under `ROLES_PATHS`; the compiled form
/// is memoized in-process and rebuilt only when the source changes.
pub struct PolicyResolver {
    authority: Arc<dyn AuthorityClient>,
    cache: CachingService,
    compiler: PatternCompiler,
    call_timeout: Duration,
    compiled: RwLock<Option<Arc<PolicyTable>>>,
    metrics: Option<Arc<GuardMetrics>>,
}

impl PolicyResolver {
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        cache: CachingService,
        compiler: PatternCompiler,
        call_timeout: Duration,
    ) -> Self {
        Self {
            authority,
            cache,
            compiler,
            call_timeout,
            compiled: RwLock::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GuardMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve the current policy.
    ///
    /// Fails with `PolicyNotFound` when the authority has no policy and with
    /// `UpstreamUnavailable` when it cannot be reached; both deny.
    pub async fn get_policy_table(&self) -> Result<Arc<PolicyTable>> {
        if let Some(raw) = self.cache.get::<RawPolicyTable>(ROLES_PATHS_KEY).await {
            self.record_cache(true).await;
            return Ok(self.compiled_for(&raw));
        }
        self.record_cache(false).await;

        let fetched = bounded_call(
            self.call_timeout,
            "policy lookup",
            self.authority.fetch_role_paths(),
        )
        .await;

        let raw = match fetched {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("Authority returned no path policy");
                return Err(AuthzError::PolicyNotFound);
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_authority_failure().await;
                }
                return Err(e);
            }
        };

        let table = self.compiled_for(&raw);
        debug!(
            roles = table.len(),
            patterns = table.pattern_count(),
            "Path policy fetched from authority"
        );
        self.cache.set(ROLES_PATHS_KEY, &table.to_source()).await;
        Ok(table)
    }

    /// Drop the cached policy; the next request refetches it
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.del(ROLES_PATHS_KEY).await?;
        *self.compiled.write() = None;
        info!("Path policy invalidated");
        Ok(())
    }

    fn compiled_for(&self, raw: &RawPolicyTable) -> Arc<PolicyTable> {
        let wanted = fingerprint(raw);
        if let Some(table) = self.compiled.read().as_ref() {
            if table.fingerprint == wanted {
                return table.clone();
            }
        }

        let table = Arc::new(PolicyTable::compile(raw, &self.compiler));
        *self.compiled.write() = Some(table.clone());
        table
    }

    async fn record_cache(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache(CacheKind::Policy, hit).await;
        }
    }
}
