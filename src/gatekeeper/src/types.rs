//! Core gatekeeper types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Role name
pub type RoleName = String;

/// Claim that carries the subject identifier
pub const SUBJECT_CLAIM: &str = "sub";

/// Authenticated caller, produced by verifying a bearer credential.
///
/// Immutable for the lifetime of the request it was verified for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject identifier (the `sub` claim, numbers rendered as strings)
    pub subject_id: String,

    /// Every claim of the verified credential, untouched
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Build a principal from verified claims.
    ///
    /// Returns `None` when the subject claim is missing or is neither a
    /// string nor a number.
    pub fn from_claims(claims: Map<String, Value>) -> Option<Self> {
        let subject_id = match claims.get(SUBJECT_CLAIM)? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        Some(Self { subject_id, claims })
    }

    /// Look up a raw claim
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Roles currently attributed to a principal. Order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleName>);

impl RoleSet {
    /// Empty role set ("no access")
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleName> {
        self.0.iter()
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        Self(roles.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for RoleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Missing, malformed, invalid or expired credential
    Unauthenticated,
    /// Valid credential, but no policy pattern admits the path
    Unauthorized,
}

/// Terminal authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Route visibility tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable without a credential
    Public,
    /// Guarded by token, role and path policy
    Protected,
}

/// Visibility metadata attached to a route.
///
/// The handler-level tag wins over the group (controller) level tag; a route
/// with neither is protected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteAccess {
    pub handler: Option<Visibility>,
    pub group: Option<Visibility>,
}

impl RouteAccess {
    /// Protected route with no explicit tags
    pub fn protected() -> Self {
        Self::default()
    }

    /// Route explicitly tagged public at handler level
    pub fn public() -> Self {
        Self {
            handler: Some(Visibility::Public),
            group: None,
        }
    }

    pub fn with_handler(mut self, visibility: Visibility) -> Self {
        self.handler = Some(visibility);
        self
    }

    pub fn with_group(mut self, visibility: Visibility) -> Self {
        self.group = Some(visibility);
        self
    }

    /// Effective visibility after precedence is applied
    pub fn effective(&self) -> Visibility {
        self.handler
            .or(self.group)
            .unwrap_or(Visibility::Protected)
    }

    pub fn is_public(&self) -> bool {
        self.effective() == Visibility::Public
    }
}
