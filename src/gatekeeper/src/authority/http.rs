//! HTTP authority client

use super::{AuthorityClient, RawPolicyTable, TokenSettings};
use crate::config::AuthorityConfig;
use crate::envelope::BaseResponse;
use crate::error::{AuthzError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

const ROLES_USER_PATH: &str = "/roles/user";
const ROLES_PATHS_PATH: &str = "/roles/paths";
const JWT_CONFIG_PATH: &str = "/jwt/config";

/// reqwest-backed [`AuthorityClient`].
///
/// Every request carries the service bearer credential and is bounded by the
/// configured timeout. Answers arrive wrapped in a [`BaseResponse`].
#[derive(Clone)]
pub struct HttpAuthorityClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthorityClient {
    pub fn new(config: &AuthorityConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if !config.service_token.is_empty() {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_token))
                .map_err(|_| AuthzError::Config("service token is not a valid header value".to_string()))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthzError::Config(format!("failed to build authority client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and unwrap the envelope's `responseData`
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        debug!(
            method = "GET",
            path = %path,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Authority response"
        );

        if !status.is_success() {
            return Err(AuthzError::UpstreamUnavailable(format!(
                "GET {} answered {}",
                path, status
            )));
        }

        let envelope: BaseResponse<T> = response.json().await?;
        Ok(envelope.into_data())
    }
}

/// `/roles/user/<subject>`; the subject is one percent-encoded segment
fn user_roles_path(subject_id: &str) -> String {
    format!("{}/{}", ROLES_USER_PATH, urlencoding::encode(subject_id))
}

#[async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn fetch_user_roles(&self, subject_id: &str) -> Result<Vec<String>> {
        let path = user_roles_path(subject_id);
        Ok(self.get_data::<Vec<String>>(&path).await?.unwrap_or_default())
    }

    async fn fetch_role_paths(&self) -> Result<Option<RawPolicyTable>> {
        self.get_data(ROLES_PATHS_PATH).await
    }

    async fn fetch_token_settings(&self) -> Result<TokenSettings> {
        self.get_data::<TokenSettings>(JWT_CONFIG_PATH)
            .await?
            .filter(|settings| !settings.secret.is_empty())
            .ok_or_else(|| AuthzError::Config("JWT secret is not configured".to_string()))
    }
}
