//! Cloud account model and related types.

use super::{CloudQuotaData, CloudTokenData};
use serde::{Deserialize, Serialize};

/// Identity provider that issued the account's OAuth credentials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google OAuth (Cloud Code quota endpoints)
    #[default]
    Google,
    /// Anthropic OAuth
    Anthropic,
}

/// Health of an account as last observed by the monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Usable for rotation
    #[default]
    Active,
    /// Provider answered 403 on the last quota check
    RateLimited,
    /// Refresh token was rejected; re-authorization required
    Expired,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::RateLimited => "rate_limited",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// An OAuth-authenticated identity in the rotation pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudAccount {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Issuing identity provider
    #[serde(default)]
    pub provider: Provider,
    /// Email address associated with the account
    pub email: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Authentication token data
    pub token: CloudTokenData,
    /// Last fetched quota information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<CloudQuotaData>,
    /// Last observed health
    #[serde(default)]
    pub status: AccountStatus,
    /// Whether this account is the one injected into the target application
    #[serde(default)]
    pub is_active: bool,
    /// Timestamp when account was created (epoch seconds)
    pub created_at: i64,
    /// Timestamp when account was last used (epoch seconds)
    pub last_used: i64,
}

impl CloudAccount {
    /// Create a new account with the given ID, email, and token.
    pub fn new(id: String, email: String, token: CloudTokenData) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id,
            provider: Provider::Google,
            email,
            name: None,
            avatar_url: None,
            token,
            quota: None,
            status: AccountStatus::Active,
            is_active: false,
            created_at: now,
            last_used: now,
        }
    }

    /// Update the last used timestamp to now.
    pub fn update_last_used(&mut self) {
        self.last_used = chrono::Utc::now().timestamp();
    }

    /// Update the quota data.
    pub fn update_quota(&mut self, quota: CloudQuotaData) {
        self.quota = Some(quota);
    }

    /// Name shown to the user, falling back to the email.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(&self.email)
    }

    /// Mean quota percentage across all models, 0 when unknown.
    pub fn average_quota(&self) -> f64 {
        self.quota.as_ref().map_or(0.0, CloudQuotaData::average_percentage)
    }
}
