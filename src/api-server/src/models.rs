use cretoai_gatekeeper::RoleSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// The authenticated caller, as seen by a protected handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub subject_id: String,
    pub claims: Map<String, Value>,
    pub roles: RoleSet,
    pub matched_pattern: Option<String>,
}

/// Result of a cache invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationResponse {
    /// Key or prefix that was invalidated
    pub invalidated: String,

    /// Keys removed, when the store reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}
