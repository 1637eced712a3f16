//! Bearer credential extraction and verification

use crate::authority::TokenSettings;
use crate::config::TokenConfig;
use crate::error::{AuthzError, Result};
use crate::types::Principal;
use jsonwebtoken::{DecodingKey, Validation};
use serde_json::{Map, Value};

/// The only accepted authorization scheme
pub const BEARER_SCHEME: &str = "Bearer";

/// Pull the credential out of an `Authorization` header value.
///
/// The scheme must be exactly `Bearer` (case-sensitive) followed by a single
/// space and a non-empty token.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;

    if scheme == BEARER_SCHEME && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Verifies end-user credentials (HMAC-signed JWTs) into a [`Principal`]
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, config: &TokenConfig) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthzError::Config("JWT secret is not configured".to_string()));
        }

        let mut validation = Validation::new(config.algorithm.as_jwt());
        validation.leeway = config.leeway_secs;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Build from a config that carries its own secret
    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .ok_or_else(|| AuthzError::Config("JWT secret is not configured".to_string()))?;
        Self::new(secret, config)
    }

    /// Build from settings served by the authority
    pub fn from_settings(settings: &TokenSettings, config: &TokenConfig) -> Result<Self> {
        Self::new(&settings.secret, config)
    }

    /// Check signature and expiry, then extract the subject
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)?;

        Principal::from_claims(data.claims)
            .ok_or_else(|| AuthzError::Unauthenticated("credential carries no subject".to_string()))
    }
}
