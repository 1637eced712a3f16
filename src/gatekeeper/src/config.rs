//! Gatekeeper configuration
//!
//! Built once at process start and handed to each component explicitly.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL for cached role sets and the path policy (24h)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Default bound on a single cache or authority call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub roles: RoleCacheConfig,
}

impl GatekeeperConfig {
    pub fn validate(&self) -> Result<()> {
        self.authority.validate()?;
        self.cache.validate()?;
        self.patterns.validate()
    }
}

/// Remote authority settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Base URL, e.g. `https://auth.internal:8443`
    pub base_url: String,

    /// Service-to-service bearer credential
    #[serde(default, skip_serializing)]
    pub service_token: String,

    /// Per-request timeout
    #[serde(default = "default_call_timeout", with = "duration_str")]
    pub timeout: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            service_token: String::new(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl AuthorityConfig {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service_token: service_token.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(AuthzError::Config("AUTH_BASE_URL is not provided".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AuthzError::Config(format!(
                "authority base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(AuthzError::Config("authority timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL of role and policy entries
    #[serde(default = "default_cache_ttl", with = "duration_str")]
    pub ttl: Duration,

    /// Bound on a single cache store call
    #[serde(default = "default_call_timeout", with = "duration_str")]
    pub operation_timeout: Duration,

    /// Capacity of the in-memory store
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            operation_timeout: DEFAULT_CALL_TIMEOUT,
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(AuthzError::Config("cache TTL must be positive".to_string()));
        }
        if self.max_entries == 0 {
            return Err(AuthzError::Config("cache capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// Signature algorithms accepted for end-user credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl TokenAlgorithm {
    pub fn as_jwt(&self) -> jsonwebtoken::Algorithm {
        match self {
            TokenAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            TokenAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            TokenAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl std::str::FromStr for TokenAlgorithm {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(TokenAlgorithm::HS256),
            "HS384" => Ok(TokenAlgorithm::HS384),
            "HS512" => Ok(TokenAlgorithm::HS512),
            other => Err(AuthzError::Config(format!("unsupported JWT algorithm: {}", other))),
        }
    }
}

/// End-user credential verification settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Shared secret. When absent it is loaded from the authority at startup.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    #[serde(default)]
    pub algorithm: TokenAlgorithm,

    /// Clock skew tolerated on `exp`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,
}

/// How `*` in a path specification treats `/`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WildcardMode {
    /// `*` matches any characters, `/` included
    #[default]
    CrossSegment,
    /// `*` stops at `/`
    SingleSegment,
}

impl std::str::FromStr for WildcardMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "cross-segment" | "cross" => Ok(WildcardMode::CrossSegment),
            "single-segment" | "single" => Ok(WildcardMode::SingleSegment),
            other => Err(AuthzError::Config(format!("unknown wildcard mode: {}", other))),
        }
    }
}

/// Pattern compiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default)]
    pub wildcard: WildcardMode,

    /// Compiled patterns kept in the in-process memo
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            wildcard: WildcardMode::default(),
            memo_capacity: default_memo_capacity(),
        }
    }
}

impl PatternConfig {
    fn validate(&self) -> Result<()> {
        if self.memo_capacity == 0 {
            return Err(AuthzError::Config("pattern memo capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// Role cache behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCacheConfig {
    /// Treat a cached empty role list as a miss and ask the authority again
    #[serde(default)]
    pub refetch_empty: bool,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_call_timeout() -> Duration {
    DEFAULT_CALL_TIMEOUT
}

fn default_max_entries() -> usize {
    100_000
}

fn default_memo_capacity() -> usize {
    4_096
}

/// Parse a duration such as `500ms`, `30s`, `15m`, `24h`, `7d`.
///
/// A bare number is milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (value, unit) = input.split_at(split);

    let value: u64 = value
        .parse()
        .map_err(|_| AuthzError::Config(format!("invalid time value: '{}'", input)))?;

    let factor: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60 * 1_000,
        "h" => 60 * 60 * 1_000,
        "d" => 24 * 60 * 60 * 1_000,
        _ => return Err(AuthzError::Config(format!("invalid time unit: '{}'", input))),
    };

    let millis = value
        .checked_mul(factor)
        .ok_or_else(|| AuthzError::Config(format!("invalid time value: '{}'", input)))?;

    Ok(Duration::from_millis(millis))
}

/// Serde adapter: durations as `parse_duration` strings (or bare millis)
mod duration_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}
