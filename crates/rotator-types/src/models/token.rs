//! Token data model.

use serde::{Deserialize, Serialize};

/// Seconds before expiry at which a token is considered stale.
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// OAuth token data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudTokenData {
    /// OAuth access token
    pub access_token: String,
    /// OAuth refresh token; empty when the provider withheld it
    #[serde(default)]
    pub refresh_token: String,
    /// Token validity duration in seconds
    pub expires_in: i64,
    /// Absolute timestamp when token expires (epoch seconds)
    pub expiry_timestamp: i64,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Email associated with the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CloudTokenData {
    /// Create new token data issued now.
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        email: Option<String>,
    ) -> Self {
        Self::issued_at(chrono::Utc::now().timestamp(), access_token, refresh_token, expires_in, email)
    }

    /// Create token data issued at the given epoch second.
    pub fn issued_at(
        issued_at: i64,
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        email: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            expiry_timestamp: issued_at.saturating_add(expires_in),
            token_type: "Bearer".to_string(),
            email,
        }
    }

    /// Replace the access token with a freshly issued one, keeping the refresh token.
    pub fn renew(&mut self, access_token: String, expires_in: i64, now: i64) {
        self.access_token = access_token;
        self.expires_in = expires_in;
        self.expiry_timestamp = now.saturating_add(expires_in);
    }

    /// Stale means `expiry_timestamp < now + REFRESH_BUFFER_SECS`.
    pub fn is_stale_at(&self, now: i64) -> bool {
        self.expiry_timestamp < now.saturating_add(REFRESH_BUFFER_SECS)
    }

    /// Check staleness against the wall clock.
    pub fn needs_refresh(&self) -> bool {
        self.is_stale_at(chrono::Utc::now().timestamp())
    }

    /// Whether the provider gave us a refresh token at all.
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}
