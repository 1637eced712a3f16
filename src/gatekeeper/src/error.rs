//! Error types for the gatekeeper

use crate::types::DenyReason;
use thiserror::Error;

/// Caller-facing message for a missing or malformed credential
pub const MSG_UNAUTHENTICATED: &str = "Unauthorized";

/// Caller-facing message for a credential that failed verification
pub const MSG_INVALID_TOKEN: &str = "Invalid or expired token";

/// Caller-facing message when no policy pattern matches the path
pub const MSG_PATH_NOT_ALLOWED: &str = "You are not allowed to access this path";

/// Caller-facing message when the authority has no path policy
pub const MSG_POLICY_NOT_FOUND: &str = "Role paths not found";

/// Gatekeeper errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Missing, malformed, invalid or expired credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid credential, but the path is not reachable with the caller's roles
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The authority could not be reached or answered with a failure
    #[error("Authority unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The authority returned no path policy at all
    #[error("Path policy not found")]
    PolicyNotFound,

    /// A path specification could not be compiled
    #[error("Invalid pattern '{source_pattern}': {reason}")]
    InvalidPattern {
        source_pattern: String,
        reason: String,
    },

    /// Cache store failure or timeout
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Credential decoding/verification failure
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// (De)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// The denial kind this error resolves to when it ends a request.
    ///
    /// Everything that is not a credential problem denies as `Unauthorized`:
    /// policy absence fails closed.
    pub fn deny_reason(&self) -> DenyReason {
        match self {
            AuthzError::Unauthenticated(_) | AuthzError::Token(_) => DenyReason::Unauthenticated,
            _ => DenyReason::Unauthorized,
        }
    }

    /// Short, caller-safe message. Internal detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthzError::Unauthenticated(_) => MSG_UNAUTHENTICATED,
            AuthzError::Token(_) => MSG_INVALID_TOKEN,
            AuthzError::PolicyNotFound => MSG_POLICY_NOT_FOUND,
            _ => MSG_PATH_NOT_ALLOWED,
        }
    }
}

impl From<reqwest::Error> for AuthzError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthzError::UpstreamUnavailable(format!("request timed out: {}", err))
        } else {
            AuthzError::UpstreamUnavailable(err.to_string())
        }
    }
}

/// Result type for gatekeeper operations
pub type Result<T> = std::result::Result<T, AuthzError>;
