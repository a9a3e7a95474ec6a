//! Unified error types for the rotator core.

use rotator_types::{AccountError, ProcessError, ProviderError, VaultError};
use serde::Serialize;
use thiserror::Error;

use crate::modules::rotation::SwitchStage;

/// Main error type for all core operations.
///
/// `Clone` so a single in-flight refresh can hand the same failure to every waiter;
/// foreign error types are therefore captured by message.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AppError {
    /// Target application's SQLite state store failed.
    #[error("Database error: {0}")]
    Database(String),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration loading or saving failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(String),

    /// Credential vault failure.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Remote identity provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Account operation failed (not found, refresh, quota).
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Process control failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// One rotation attempt aborted at `stage`.
    #[error("Switch to account {account_id} failed during {stage}: {source}")]
    SwitchFailed {
        account_id: String,
        stage: SwitchStage,
        source: Box<AppError>,
    },
}

impl AppError {
    /// True when the vault cannot operate at all.
    pub const fn is_key_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Vault(VaultError::KeyStorageUnavailable { .. })
                | Self::Account(AccountError::Vault(VaultError::KeyStorageUnavailable { .. }))
        )
    }

    /// Provider error carried by this error, directly or inside an account error.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(e)
            | Self::Account(
                AccountError::TokenRefreshFailed { source: e, .. }
                | AccountError::QuotaCheckFailed { source: e, .. },
            ) => Some(e),
            _ => None,
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for core operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
