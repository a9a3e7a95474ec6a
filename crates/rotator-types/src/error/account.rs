//! Account-related errors.

use super::{ProviderError, VaultError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AccountError {
    /// Account with given ID not found
    #[error("Account not found: {id}")]
    NotFound {
        /// Unique identifier of the missing account
        id: String,
    },

    /// Account storage/filesystem error
    #[error("Account storage error: {message}")]
    StorageError {
        /// Description of the storage failure
        message: String,
    },

    /// Account token refresh failed
    #[error("Failed to refresh token for {id}: {source}")]
    TokenRefreshFailed {
        /// Unique identifier of the account
        id: String,
        /// Provider failure behind the refresh
        source: ProviderError,
    },

    /// Quota could not be fetched for the account
    #[error("Quota check failed for {id}: {source}")]
    QuotaCheckFailed {
        /// Unique identifier of the account
        id: String,
        /// Provider failure behind the check
        source: ProviderError,
    },

    /// Secret fields could not be encrypted or decrypted
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),
}

impl AccountError {
    /// Check if this is a temporary error that may resolve on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TokenRefreshFailed { source: ProviderError::Network { .. }, .. }
                | Self::QuotaCheckFailed { source: ProviderError::Network { .. }, .. }
        )
    }

    /// Check if the account should be marked `expired` because of this error.
    pub const fn should_expire_account(&self) -> bool {
        matches!(self, Self::TokenRefreshFailed { source: ProviderError::InvalidGrant { .. }, .. })
    }
}
