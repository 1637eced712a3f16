//! Authority client contract
//!
//! The authority is the source of truth for role assignments, the path
//! policy and the end-user token settings. Calls authenticate with a
//! service credential that is distinct from end-user credentials.

mod http;

pub use http::HttpAuthorityClient;

use crate::error::{AuthzError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Path policy as the authority returns it: role name → path specifications
pub type RawPolicyTable = BTreeMap<String, Vec<String>>;

/// `/jwt/config` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSettings {
    pub secret: String,
    #[serde(default)]
    pub sign_options: SignOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOptions {
    /// Lifetime of issued tokens, e.g. `"1d"`
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Remote authority
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// `GET /roles/user/{subject_id}`
    async fn fetch_user_roles(&self, subject_id: &str) -> Result<Vec<String>>;

    /// `GET /roles/paths`; `None` when the authority has no policy at all
    async fn fetch_role_paths(&self) -> Result<Option<RawPolicyTable>>;

    /// `GET /jwt/config`
    async fn fetch_token_settings(&self) -> Result<TokenSettings>;
}

/// In-memory authority with call counters.
///
/// Used by tests and local runs; answers from fixed tables and can be
/// switched into a failing mode.
#[derive(Default)]
pub struct StaticAuthority {
    roles: RwLock<HashMap<String, Vec<String>>>,
    policy: RwLock<Option<RawPolicyTable>>,
    token: RwLock<Option<TokenSettings>>,
    latency: RwLock<Duration>,
    failing: AtomicBool,
    role_calls: AtomicUsize,
    policy_calls: AtomicUsize,
    token_calls: AtomicUsize,
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(self, subject_id: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_roles(subject_id, roles);
        self
    }

    pub fn with_policy(self, policy: RawPolicyTable) -> Self {
        self.set_policy(Some(policy));
        self
    }

    pub fn with_token_settings(self, settings: TokenSettings) -> Self {
        *self.token.write() = Some(settings);
        self
    }

    /// Delay every answer, to widen race windows in tests
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = latency;
        self
    }

    pub fn set_roles<I, S>(&self, subject_id: &str, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.write().insert(
            subject_id.to_string(),
            roles.into_iter().map(Into::into).collect(),
        );
    }

    pub fn set_policy(&self, policy: Option<RawPolicyTable>) {
        *self.policy.write() = policy;
    }

    /// Make every call fail with `UpstreamUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    pub fn policy_calls(&self) -> usize {
        self.policy_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    async fn simulate(&self) -> Result<()> {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthzError::UpstreamUnavailable("authority offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorityClient for StaticAuthority {
    async fn fetch_user_roles(&self, subject_id: &str) -> Result<Vec<String>> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.roles.read().get(subject_id).cloned().unwrap_or_default())
    }

    async fn fetch_role_paths(&self) -> Result<Option<RawPolicyTable>> {
        self.policy_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.policy.read().clone())
    }

    async fn fetch_token_settings(&self) -> Result<TokenSettings> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        self.token
            .read()
            .clone()
            .ok_or_else(|| AuthzError::Config("JWT secret is not configured".to_string()))
    }
}
