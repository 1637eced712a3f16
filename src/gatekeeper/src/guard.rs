//! Authorization guard
//!
//! Drives one request through
//! `Start → TokenCheck → RoleLookup → PolicyLookup → PathMatch → Allowed | Denied`.
//! Public routes short-circuit from `Start` straight to `Allowed`. Any failure
//! moves to `Denied`; there is no retry transition.

use crate::authority::AuthorityClient;
use crate::cache::{CacheStore, CachingService};
use crate::config::GatekeeperConfig;
use crate::error::{AuthzError, Result};
use crate::evaluator;
use crate::metrics::GuardMetrics;
use crate::pattern::PatternCompiler;
use crate::resolver::{bounded_call, PolicyResolver, RoleResolver};
use crate::token::{extract_bearer, TokenVerifier};
use crate::types::{Decision, DenyReason, Principal, RoleSet, RouteAccess};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Guard state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Start,
    TokenCheck,
    RoleLookup,
    PolicyLookup,
    PathMatch,
    Allowed,
    Denied,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardState::Start => "start",
            GuardState::TokenCheck => "token_check",
            GuardState::RoleLookup => "role_lookup",
            GuardState::PolicyLookup => "policy_lookup",
            GuardState::PathMatch => "path_match",
            GuardState::Allowed => "allowed",
            GuardState::Denied => "denied",
        };
        f.write_str(name)
    }
}

/// What the guard needs to know about an inbound request
#[derive(Debug, Clone, Copy)]
pub struct GuardRequest<'a> {
    /// Raw `Authorization` header value
    pub authorization: Option<&'a str>,
    /// Request path, without query string
    pub path: &'a str,
    /// Visibility metadata of the matched route
    pub access: RouteAccess,
}

impl<'a> GuardRequest<'a> {
    pub fn new(authorization: Option<&'a str>, path: &'a str, access: RouteAccess) -> Self {
        Self {
            authorization,
            path,
            access,
        }
    }
}

/// Context handed to downstream handlers on `Allowed`
#[derive(Debug, Clone, PartialEq)]
pub struct AccessGrant {
    /// `None` when the route is public and no credential was checked
    pub principal: Option<Principal>,
    pub roles: RoleSet,
    /// Specification that admitted the path
    pub matched_pattern: Option<String>,
}

impl AccessGrant {
    fn public() -> Self {
        Self {
            principal: None,
            roles: RoleSet::empty(),
            matched_pattern: None,
        }
    }
}

/// Terminal denial with the caller-facing message only
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Denial {
    pub reason: DenyReason,
    /// State in which the request was denied
    pub state: GuardState,
    pub message: &'static str,
}

/// Per-request authorization orchestrator.
///
/// Holds no per-request mutable state; share it behind an `Arc`.
pub struct AuthGuard {
    verifier: TokenVerifier,
    roles: RoleResolver,
    policy: PolicyResolver,
    metrics: Option<Arc<GuardMetrics>>,
}

impl AuthGuard {
    pub fn new(
        verifier: TokenVerifier,
        roles: RoleResolver,
        policy: PolicyResolver,
        metrics: Option<Arc<GuardMetrics>>,
    ) -> Self {
        Self {
            verifier,
            roles,
            policy,
            metrics,
        }
    }

    /// Wire the resolvers from configuration and already-built collaborators
    pub fn from_config(
        config: &GatekeeperConfig,
        verifier: TokenVerifier,
        authority: Arc<dyn AuthorityClient>,
        store: Arc<dyn CacheStore>,
        metrics: Option<Arc<GuardMetrics>>,
    ) -> Self {
        let cache = CachingService::new(store, &config.cache);
        let call_timeout = config.authority.timeout;

        let mut roles = RoleResolver::new(
            authority.clone(),
            cache.clone(),
            config.roles.clone(),
            call_timeout,
        );
        let mut policy = PolicyResolver::new(
            authority,
            cache,
            PatternCompiler::new(&config.patterns),
            call_timeout,
        );
        if let Some(metrics) = &metrics {
            roles = roles.with_metrics(metrics.clone());
            policy = policy.with_metrics(metrics.clone());
        }

        Self::new(verifier, roles, policy, metrics)
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    pub fn policy(&self) -> &PolicyResolver {
        &self.policy
    }

    pub fn metrics(&self) -> Option<&Arc<GuardMetrics>> {
        self.metrics.as_ref()
    }

    /// Run the state machine for one request
    pub async fn authorize(&self, request: &GuardRequest<'_>) -> std::result::Result<AccessGrant, Denial> {
        let started = Instant::now();
        let outcome = self.run(request).await;

        if let Some(metrics) = &self.metrics {
            let decision = match &outcome {
                Ok(_) => Decision::Allow,
                Err(denial) => Decision::Deny(denial.reason),
            };
            metrics.record_decision(decision).await;
            metrics.record_latency(started.elapsed()).await;
        }

        outcome
    }

    /// Same as [`authorize`](Self::authorize), reduced to the decision
    pub async fn decide(&self, request: &GuardRequest<'_>) -> Decision {
        match self.authorize(request).await {
            Ok(_) => Decision::Allow,
            Err(denial) => Decision::Deny(denial.reason),
        }
    }

    async fn run(&self, request: &GuardRequest<'_>) -> std::result::Result<AccessGrant, Denial> {
        let path = request.path;

        if request.access.is_public() {
            transition(GuardState::Start, GuardState::Allowed, path);
            if let Some(metrics) = &self.metrics {
                metrics.record_public_bypass().await;
            }
            return Ok(AccessGrant::public());
        }

        let state = transition(GuardState::Start, GuardState::TokenCheck, path);
        let token = extract_bearer(request.authorization).ok_or_else(|| {
            deny(
                state,
                path,
                AuthzError::Unauthenticated("missing or non-bearer authorization header".to_string()),
            )
        })?;
        let principal = self
            .verifier
            .verify(token)
            .map_err(|e| deny(state, path, e))?;

        let state = transition(state, GuardState::RoleLookup, path);
        let (roles, policy) = tokio::join!(
            self.roles.get_roles(&principal.subject_id),
            self.policy.get_policy_table()
        );

        let state = transition(state, GuardState::PolicyLookup, path);
        let table = policy.map_err(|e| deny(state, path, e))?;

        let state = transition(state, GuardState::PathMatch, path);
        let matched = evaluator::matching_pattern(&roles, &table, path)
            .map(|pattern| pattern.source().to_string())
            .ok_or_else(|| {
                deny(
                    state,
                    path,
                    AuthzError::Unauthorized(format!(
                        "subject {} with {} role(s) has no pattern admitting the path",
                        principal.subject_id,
                        roles.len()
                    )),
                )
            })?;

        transition(state, GuardState::Allowed, path);
        debug!(subject = %principal.subject_id, path = %path, pattern = %matched, "Request allowed");

        Ok(AccessGrant {
            principal: Some(principal),
            roles,
            matched_pattern: Some(matched),
        })
    }
}

fn transition(from: GuardState, to: GuardState, path: &str) -> GuardState {
    debug!(from = %from, to = %to, path = %path, "Guard transition");
    to
}

fn deny(state: GuardState, path: &str, cause: AuthzError) -> Denial {
    warn!(state = %state, path = %path, error = %cause, "Request denied");
    Denial {
        reason: cause.deny_reason(),
        state,
        message: cause.public_message(),
    }
}

/// Build a guard whose verifier secret comes from the authority when the
/// configuration carries none
pub async fn bootstrap(
    config: &GatekeeperConfig,
    authority: Arc<dyn AuthorityClient>,
    store: Arc<dyn CacheStore>,
    metrics: Option<Arc<GuardMetrics>>,
) -> Result<AuthGuard> {
    config.validate()?;

    let verifier = match config.token.secret.as_deref() {
        Some(secret) => TokenVerifier::new(secret, &config.token)?,
        None => {
            let settings = bounded_call(
                config.authority.timeout,
                "token settings lookup",
                authority.fetch_token_settings(),
            )
            .await?;
            TokenVerifier::from_settings(&settings, &config.token)?
        }
    };

    Ok(AuthGuard::from_config(config, verifier, authority, store, metrics))
}
