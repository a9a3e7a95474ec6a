//! Google OAuth and Cloud Code quota client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use rotator_types::{CloudQuotaData, ProviderError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{IdentityProvider, TokenGrant, UserInfo};
use crate::utils::http::{create_client, truncate_body};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const CLOUD_CODE_BASE_URL: &str = "https://cloudcode-pa.googleapis.com";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/oauth-callback";

const REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_ATTEMPTS: u32 = 3;

/// Endpoint base URLs; overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub token_url: String,
    pub userinfo_url: String,
    pub cloud_code_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
            cloud_code_base: CLOUD_CODE_BASE_URL.to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints under one base URL (`/token`, `/userinfo`, `/v1internal:*`).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            token_url: format!("{base}/token"),
            userinfo_url: format!("{base}/userinfo"),
            cloud_code_base: base.to_string(),
        }
    }
}

/// OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl OAuthClient {
    /// Read the registration from `ROTATOR_GOOGLE_CLIENT_ID` / `GOOGLE_OAUTH_CLIENT_ID`
    /// and the matching `*_CLIENT_SECRET` / `ROTATOR_GOOGLE_REDIRECT_URI` variables.
    pub fn from_env() -> Result<Self, String> {
        let client_id = env_first(&["ROTATOR_GOOGLE_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_ID"])
            .ok_or_else(|| {
                "Missing Google OAuth client_id. Set ROTATOR_GOOGLE_CLIENT_ID.".to_string()
            })?;
        Ok(Self {
            client_id,
            client_secret: env_first(&[
                "ROTATOR_GOOGLE_CLIENT_SECRET",
                "GOOGLE_OAUTH_CLIENT_SECRET",
            ]),
            redirect_uri: env_first(&["ROTATOR_GOOGLE_REDIRECT_URI"])
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    #[serde(default)]
    models: HashMap<String, ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(rename = "quotaInfo")]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
struct QuotaInfo {
    #[serde(rename = "remainingFraction")]
    remaining_fraction: Option<f64>,
    #[serde(rename = "resetTime")]
    reset_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoadProjectResponse {
    #[serde(rename = "cloudaicompanionProject")]
    project_id: Option<String>,
}

/// Only the model families the target application exposes are tracked.
fn is_tracked_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("gemini") || lower.contains("claude")
}

fn network_error(e: &reqwest::Error) -> ProviderError {
    ProviderError::Network { message: e.to_string() }
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::from_status(status, truncate_body(&body, 512))
}

/// [`IdentityProvider`] for Google accounts.
pub struct GoogleProvider {
    client: Client,
    endpoints: GoogleEndpoints,
    oauth: OAuthClient,
    retry_delay: Duration,
}

impl GoogleProvider {
    pub fn new(oauth: OAuthClient) -> Result<Self, String> {
        Self::with_endpoints(oauth, GoogleEndpoints::default())
    }

    pub fn with_endpoints(oauth: OAuthClient, endpoints: GoogleEndpoints) -> Result<Self, String> {
        Ok(Self {
            client: create_client(REQUEST_TIMEOUT_SECS)?,
            endpoints,
            oauth,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Pause between quota retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn post_token_form(&self, mut params: Vec<(&str, String)>) -> Result<TokenGrant, ProviderError> {
        params.push(("client_id", self.oauth.client_id.clone()));
        if let Some(secret) = &self.oauth.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| ProviderError::Decode { message: format!("token response: {e}") })
    }

    /// Resolve the Cloud Code project; failures other than 401 are tolerated.
    async fn load_project_id(&self, access_token: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1internal:loadCodeAssist", self.endpoints.cloud_code_base))
            .bearer_auth(access_token)
            .json(&json!({"metadata": {"ideType": "ANTIGRAVITY"}}))
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                Ok(res.json::<LoadProjectResponse>().await.ok().and_then(|d| d.project_id))
            },
            Ok(res) if res.status() == reqwest::StatusCode::UNAUTHORIZED => {
                Err(error_from_response(res).await)
            },
            Ok(res) => {
                warn!("[Provider] loadCodeAssist failed: Status: {}", res.status());
                Ok(None)
            },
            Err(e) => {
                warn!("[Provider] loadCodeAssist network error: {}", e);
                Ok(None)
            },
        }
    }

    fn parse_quota(response: QuotaResponse) -> CloudQuotaData {
        let mut quota = CloudQuotaData::new();
        for (name, info) in response.models {
            let Some(quota_info) = info.quota_info else { continue };
            if !is_tracked_model(&name) {
                continue;
            }
            let percentage = quota_info.remaining_fraction.map_or(0.0, |f| (f * 100.0).round());
            quota.add_model(name, percentage, quota_info.reset_time.unwrap_or_default());
        }
        quota
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let grant = self
            .post_token_form(vec![
                ("code", code.to_string()),
                ("redirect_uri", self.oauth.redirect_uri.clone()),
                ("grant_type", "authorization_code".to_string()),
            ])
            .await?;
        if grant.refresh_token.is_none() {
            warn!(
                "[Provider] Google did not return a refresh_token; the account will need \
                 re-authorization once the access token expires"
            );
        }
        Ok(grant)
    }

    async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<UserInfo>()
            .await
            .map_err(|e| ProviderError::Decode { message: format!("userinfo response: {e}") })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        if refresh_token.trim().is_empty() {
            return Err(ProviderError::MissingRefreshToken);
        }
        self.post_token_form(vec![
            ("refresh_token", refresh_token.to_string()),
            ("grant_type", "refresh_token".to_string()),
        ])
        .await
    }

    async fn fetch_quota(&self, access_token: &str) -> Result<CloudQuotaData, ProviderError> {
        let project_id = self.load_project_id(access_token).await?;
        let payload = match &project_id {
            Some(project) => json!({ "project": project }),
            None => json!({}),
        };
        let url = format!("{}/v1internal:fetchAvailableModels", self.endpoints.cloud_code_base);

        let mut last_error = ProviderError::Network { message: "no attempt made".to_string() };
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.post(&url).bearer_auth(access_token).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    let parsed: QuotaResponse = response.json().await.map_err(|e| {
                        ProviderError::Decode { message: format!("quota response: {e}") }
                    })?;
                    debug!("[Provider] Quota API returned {} models", parsed.models.len());
                    return Ok(Self::parse_quota(parsed));
                },
                Ok(response) => {
                    let error = error_from_response(response).await;
                    // 401/403 are answers, not transient failures.
                    if error.is_unauthorized() || error.is_forbidden() {
                        return Err(error);
                    }
                    warn!("[Provider] Quota API error: {} (attempt {}/{})", error, attempt, MAX_ATTEMPTS);
                    last_error = error;
                },
                Err(e) => {
                    warn!("[Provider] Quota request failed: {} (attempt {}/{})", e, attempt, MAX_ATTEMPTS);
                    last_error = network_error(&e);
                },
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        info!("[Provider] Quota query gave up after {} attempts", MAX_ATTEMPTS);
        Err(last_error)
    }
}
