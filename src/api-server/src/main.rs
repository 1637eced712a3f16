//! Gatekeeper server
//!
//! Authorizes every request against the remote authority's roles and path
//! policy before it reaches a handler.
//!
//! # Usage
//!
//! ```bash
//! # Minimal: the JWT secret is loaded from the authority
//! AUTH_BASE_URL=https://auth.internal AUTH_BEARER_TOKEN=... gatekeeper-server
//!
//! # Custom bind address and a local secret
//! gatekeeper-server --host 127.0.0.1 --port 9090 --jwt-secret s3cret --auth-base-url http://localhost:4000
//!
//! # Enable debug logging
//! RUST_LOG=debug gatekeeper-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging filter
//! - `GATEKEEPER_HOST` / `GATEKEEPER_PORT`: bind address (default 0.0.0.0:8080)
//! - `AUTH_BASE_URL`: authority base URL (required)
//! - `AUTH_BEARER_TOKEN`: service credential for the authority
//! - `JWT_SECRET`: token secret; fetched from the authority when unset
//! - `CACHE_TTL`: role and policy TTL (default 24h)
//! - `WILDCARD_MODE`: `cross-segment` (default) or `single-segment`

use anyhow::{Context, Result};
use clap::Parser;
use cretoai_gatekeeper::{
    bootstrap, config::parse_duration, AuthorityClient, AuthorityConfig, CacheConfig, CacheStore,
    CachingService, GatekeeperConfig, GuardMetrics, HttpAuthorityClient, InMemoryCacheStore,
    PatternConfig, RoleCacheConfig, TokenAlgorithm, TokenConfig, WildcardMode,
};
use cretoai_gatekeeper_api::{server::Server, server::ServerConfig, state::AppState};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gatekeeper server
#[derive(Parser, Debug)]
#[command(
    name = "gatekeeper-server",
    version,
    about = "Request authorization gateway backed by a remote authority",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "GATEKEEPER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "GATEKEEPER_PORT")]
    port: u16,

    /// Authority base URL
    #[arg(long, env = "AUTH_BASE_URL")]
    auth_base_url: String,

    /// Service credential sent to the authority
    #[arg(long, default_value = "", env = "AUTH_BEARER_TOKEN", hide_env_values = true)]
    auth_bearer_token: String,

    /// Authority request timeout
    #[arg(long, default_value = "10s", env = "AUTH_TIMEOUT")]
    auth_timeout: String,

    /// JWT verification secret; loaded from the authority when unset
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// JWT algorithm (HS256, HS384, HS512)
    #[arg(long, default_value = "HS256", env = "JWT_ALGORITHM")]
    jwt_algorithm: String,

    /// Clock skew tolerated on token expiry, in seconds
    #[arg(long, default_value = "0", env = "JWT_LEEWAY")]
    jwt_leeway: u64,

    /// TTL of cached roles and path policy
    #[arg(long, default_value = "24h", env = "CACHE_TTL")]
    cache_ttl: String,

    /// Bound on a single cache operation
    #[arg(long, default_value = "10s", env = "CACHE_OPERATION_TIMEOUT")]
    cache_operation_timeout: String,

    /// Capacity of the in-memory cache
    #[arg(long, default_value = "100000", env = "CACHE_MAX_ENTRIES")]
    cache_max_entries: usize,

    /// How `*` treats `/` in path specifications
    #[arg(long, default_value = "cross-segment", env = "WILDCARD_MODE")]
    wildcard_mode: String,

    /// Re-fetch roles when the cached list is empty
    #[arg(long, env = "REFETCH_EMPTY_ROLES")]
    refetch_empty_roles: bool,

    /// Enable JSON logging format
    #[arg(long, env = "GATEKEEPER_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn to_config(&self) -> Result<GatekeeperConfig> {
        let authority = AuthorityConfig {
            base_url: self.auth_base_url.clone(),
            service_token: self.auth_bearer_token.clone(),
            timeout: parse_duration(&self.auth_timeout).context("invalid --auth-timeout")?,
        };

        let cache = CacheConfig {
            ttl: parse_duration(&self.cache_ttl).context("invalid --cache-ttl")?,
            operation_timeout: parse_duration(&self.cache_operation_timeout)
                .context("invalid --cache-operation-timeout")?,
            max_entries: self.cache_max_entries,
        };

        let token = TokenConfig {
            secret: self.jwt_secret.clone().filter(|s| !s.is_empty()),
            algorithm: self
                .jwt_algorithm
                .parse::<TokenAlgorithm>()
                .context("invalid --jwt-algorithm")?,
            leeway_secs: self.jwt_leeway,
        };

        let patterns = PatternConfig {
            wildcard: self
                .wildcard_mode
                .parse::<WildcardMode>()
                .context("invalid --wildcard-mode")?,
            ..Default::default()
        };

        Ok(GatekeeperConfig {
            authority,
            cache,
            token,
            patterns,
            roles: RoleCacheConfig {
                refetch_empty: self.refetch_empty_roles,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!("Starting gatekeeper server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = args.to_config()?;
    config.validate().context("invalid configuration")?;
    info!(
        authority = %config.authority.base_url,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        wildcard = ?config.patterns.wildcard,
        "Configuration loaded"
    );

    let authority: Arc<dyn AuthorityClient> = Arc::new(
        HttpAuthorityClient::new(&config.authority).context("failed to build authority client")?,
    );
    let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(&config.cache));
    let metrics = Arc::new(GuardMetrics::new());

    let guard = bootstrap(&config, authority, store.clone(), Some(metrics.clone()))
        .await
        .context("failed to initialise the authorization guard")?;
    info!("Authorization guard ready");

    let state = AppState::new(guard, CachingService::new(store, &config.cache), metrics);

    let server = Server::bind(&ServerConfig::new(args.host.as_str(), args.port), state).await?;
    info!(addr = %server.local_addr()?, "Press Ctrl+C to shutdown gracefully");

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing/logging subsystem
fn init_tracing(args: &Args) -> Result<()> {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });
    let http_level = if log_level >= tracing::Level::DEBUG {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "cretoai_gatekeeper={lvl},cretoai_gatekeeper_api={lvl},gatekeeper_server={lvl},tower_http={http}",
            lvl = log_level,
            http = http_level
        )
        .into()
    });

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .context("failed to install tracing subscriber")?;
    }

    Ok(())
}
