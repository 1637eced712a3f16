//! Cache-aside resolver tests: call counts, concurrency, degraded stores

use async_trait::async_trait;
use cretoai_gatekeeper::cache::{roles_key, ROLES_PATHS_KEY};
use cretoai_gatekeeper::{
    AuthzError, CacheConfig, CacheStore, CachingService, InMemoryCacheStore, PatternCompiler,
    PolicyResolver, RawPolicyTable, RoleCacheConfig, RoleResolver, Result, StaticAuthority,
};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn caching(store: Arc<dyn CacheStore>) -> CachingService {
    CachingService::new(store, &CacheConfig::default())
}

fn memory_cache() -> (CachingService, Arc<InMemoryCacheStore>) {
    let store = Arc::new(InMemoryCacheStore::new(&CacheConfig::default()));
    (caching(store.clone()), store)
}

fn admin_policy() -> RawPolicyTable {
    RawPolicyTable::from([("admin".to_string(), vec!["/api/users/*".to_string()])])
}

// ============================================================================
// ROLE RESOLVER
// ============================================================================

#[tokio::test]
async fn test_role_lookup_within_ttl_calls_authority_once() {
    let authority = Arc::new(StaticAuthority::new().with_roles("42", ["admin"]));
    let (cache, _) = memory_cache();
    let resolver = RoleResolver::new(
        authority.clone(),
        cache,
        RoleCacheConfig::default(),
        Duration::from_secs(10),
    );

    resolver.get_roles("42").await;
    resolver.get_roles("42").await;

    assert_eq!(authority.role_calls(), 1);
}

#[tokio::test]
async fn test_role_cache_key_layout() {
    let authority = Arc::new(StaticAuthority::new().with_roles("42", ["admin", "editor"]));
    let (cache, _) = memory_cache();
    let resolver = RoleResolver::new(
        authority,
        cache.clone(),
        RoleCacheConfig::default(),
        Duration::from_secs(10),
    );

    resolver.get_roles("42").await;

    let mut cached: Vec<String> = cache.get("ROLES_42").await.unwrap();
    cached.sort();
    assert_eq!(cached, vec!["admin", "editor"]);
}

#[tokio::test]
async fn test_concurrent_first_role_lookups_converge() {
    let authority = Arc::new(
        StaticAuthority::new()
            .with_roles("7", ["admin", "viewer"])
            .with_latency(Duration::from_millis(25)),
    );
    let (cache, _) = memory_cache();
    let resolver = Arc::new(RoleResolver::new(
        authority.clone(),
        cache.clone(),
        RoleCacheConfig::default(),
        Duration::from_secs(10),
    ));

    let lookups = (0..2).map(|_| {
        let resolver = resolver.clone();
        async move { resolver.get_roles("7").await }
    });
    let results = join_all(lookups).await;

    assert_eq!(results[0], results[1]);
    assert!(results[0].contains("admin"));

    // Redundant refills are tolerated; the cache holds one consistent value
    assert!((1..=2).contains(&authority.role_calls()));
    let mut cached: Vec<String> = cache.get(&roles_key("7")).await.unwrap();
    cached.sort();
    assert_eq!(cached, vec!["admin", "viewer"]);
}

// ============================================================================
// POLICY RESOLVER
// ============================================================================

#[tokio::test]
async fn test_concurrent_first_policy_lookups_converge() {
    let authority = Arc::new(
        StaticAuthority::new()
            .with_policy(admin_policy())
            .with_latency(Duration::from_millis(25)),
    );
    let (cache, _) = memory_cache();
    let resolver = Arc::new(PolicyResolver::new(
        authority.clone(),
        cache.clone(),
        PatternCompiler::default(),
        Duration::from_secs(10),
    ));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.get_policy_table().await })
        })
        .collect();

    for task in join_all(tasks).await {
        let table = task.unwrap().unwrap();
        assert_eq!(table.patterns_for("admin").unwrap()[0].source(), "/api/users/*");
    }

    assert!(authority.policy_calls() >= 1);
    let cached: RawPolicyTable = cache.get(ROLES_PATHS_KEY).await.unwrap();
    assert_eq!(cached, admin_policy());
}

#[tokio::test]
async fn test_policy_served_from_prepopulated_cache() {
    let authority = Arc::new(StaticAuthority::new());
    let (cache, _) = memory_cache();
    cache.set(ROLES_PATHS_KEY, &admin_policy()).await;

    let resolver = PolicyResolver::new(
        authority.clone(),
        cache,
        PatternCompiler::default(),
        Duration::from_secs(10),
    );

    let table = resolver.get_policy_table().await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(authority.policy_calls(), 0);
}

#[tokio::test]
async fn test_policy_expires_with_ttl() {
    let authority = Arc::new(StaticAuthority::new().with_policy(admin_policy()));
    let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(&CacheConfig::default()));
    let cache = CachingService::new(
        store,
        &CacheConfig {
            ttl: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let resolver = PolicyResolver::new(
        authority.clone(),
        cache,
        PatternCompiler::default(),
        Duration::from_secs(10),
    );

    resolver.get_policy_table().await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    resolver.get_policy_table().await.unwrap();

    assert_eq!(authority.policy_calls(), 2);
}

#[tokio::test]
async fn test_prefix_invalidation_clears_roles_and_policy() {
    let authority = Arc::new(
        StaticAuthority::new()
            .with_roles("1", ["admin"])
            .with_roles("2", ["admin"])
            .with_policy(admin_policy()),
    );
    let (cache, store) = memory_cache();
    let roles = RoleResolver::new(
        authority.clone(),
        cache.clone(),
        RoleCacheConfig::default(),
        Duration::from_secs(10),
    );
    let policy = PolicyResolver::new(
        authority.clone(),
        cache.clone(),
        PatternCompiler::default(),
        Duration::from_secs(10),
    );

    roles.get_roles("1").await;
    roles.get_roles("2").await;
    policy.get_policy_table().await.unwrap();
    assert_eq!(store.len(), 3);

    assert_eq!(cache.invalidate_prefix("ROLES").await.unwrap(), 3);

    roles.get_roles("1").await;
    policy.get_policy_table().await.unwrap();
    assert_eq!(authority.role_calls(), 3);
    assert_eq!(authority.policy_calls(), 2);
}

// ============================================================================
// DEGRADED CACHE STORE
// ============================================================================

/// Store that is permanently unreachable
struct UnreachableStore;

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
    async fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> Result<()> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
    async fn del(&self, _key: &str) -> Result<()> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
    async fn del_many(&self, _keys: &[String]) -> Result<usize> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
    async fn reset(&self) -> Result<()> {
        Err(AuthzError::CacheError("connection refused".into()))
    }
}

#[tokio::test]
async fn test_unreachable_cache_falls_through_to_authority() {
    let authority = Arc::new(
        StaticAuthority::new()
            .with_roles("1", ["admin"])
            .with_policy(admin_policy()),
    );
    let cache = caching(Arc::new(UnreachableStore));

    let roles = RoleResolver::new(
        authority.clone(),
        cache.clone(),
        RoleCacheConfig::default(),
        Duration::from_secs(10),
    );
    let policy = PolicyResolver::new(
        authority.clone(),
        cache,
        PatternCompiler::default(),
        Duration::from_secs(10),
    );

    assert!(roles.get_roles("1").await.contains("admin"));
    assert!(roles.get_roles("1").await.contains("admin"));
    assert!(policy.get_policy_table().await.is_ok());

    // Every lookup goes to the authority while the cache is down
    assert_eq!(authority.role_calls(), 2);
    assert!(roles.invalidate("1").await.is_err());
}
