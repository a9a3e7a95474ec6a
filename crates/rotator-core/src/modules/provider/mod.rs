//! Remote identity provider interface.

mod google;

use async_trait::async_trait;
use rotator_types::{CloudQuotaData, ProviderError};
use serde::{Deserialize, Serialize};

pub use google::{GoogleEndpoints, GoogleProvider, OAuthClient};

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Profile of the authorized identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// OAuth and quota endpoints of an identity provider.
///
/// `Unauthorized` means the access token is no longer accepted, `Forbidden` means
/// the account is rate limited, `InvalidGrant` means the refresh token is dead.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError>;

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    async fn fetch_quota(&self, access_token: &str) -> Result<CloudQuotaData, ProviderError>;
}
