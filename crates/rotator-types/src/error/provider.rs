//! Remote identity provider errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the OAuth / quota endpoints.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProviderError {
    /// 401: access token expired or revoked
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// 403: the account is rate limited or lacks access
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The refresh token itself was rejected
    #[error("Refresh token rejected (invalid_grant): {message}")]
    InvalidGrant { message: String },

    /// Account has no refresh token to use
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// Transport failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Response body did not parse
    #[error("Failed to decode response: {message}")]
    Decode { message: String },
}

impl ProviderError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Unauthorized { message: body },
            403 => Self::Forbidden { message: body },
            400 if body.contains("invalid_grant") => Self::InvalidGrant { message: body },
            _ => Self::UnexpectedStatus { status, body },
        }
    }

    /// Check if a forced token refresh may fix this error.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Check if this error means the account is rate limited.
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Check if the credentials can no longer be refreshed.
    pub const fn is_invalid_grant(&self) -> bool {
        matches!(self, Self::InvalidGrant { .. })
    }
}
