//! Credential vault errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving the master key or transforming secrets.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum VaultError {
    /// Every key storage strategy failed; the vault cannot operate
    #[error("Master key storage unavailable: {}", attempts.join("; "))]
    KeyStorageUnavailable {
        /// One `"<strategy>: <reason>"` entry per strategy tried
        attempts: Vec<String>,
    },

    /// The cipher refused to encrypt
    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    /// One of the hex segments did not decode
    #[error("Invalid ciphertext format: {message}")]
    InvalidFormat { message: String },

    /// Authentication tag did not verify (wrong key or tampered data)
    #[error("Authentication tag mismatch")]
    AuthTagMismatch,

    /// IV or tag has the wrong length
    #[error("Corrupted ciphertext: {message}")]
    CorruptedData { message: String },

    /// Any other decryption failure
    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },
}

impl VaultError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::KeyStorageUnavailable { .. } => "KEY_STORAGE_FAILED",
            Self::EncryptionFailed { .. } => "ENCRYPTION_FAILED",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::AuthTagMismatch => "AUTH_TAG_MISMATCH",
            Self::CorruptedData { .. } => "CORRUPTED_DATA",
            Self::DecryptionFailed { .. } => "DECRYPTION_FAILED",
        }
    }

    /// Fatal errors stop the vault as a whole; the rest affect one record.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyStorageUnavailable { .. })
    }
}
