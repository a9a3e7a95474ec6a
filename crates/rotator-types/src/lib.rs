//! # Rotator Types
//!
//! Core types, models, and error definitions for the cloud account rotator.
//!
//! - **`error`** - Typed error hierarchy for the vault, provider, accounts, and process control
//! - **`models`** - Domain models (CloudAccount, Token, Quota, Config)
//!
//! ## Architecture Role
//!
//! `rotator-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!     rotator-types (this crate)
//!            │
//!            ▼
//!       rotator-core
//!            │
//!            ▼
//!      rotator-daemon
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for persistence and IPC
//! - **Clone** so one in-flight result can be handed to several waiters
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{AccountError, ProcessError, ProviderError, VaultError};

// Re-export core model types
pub use models::{
    AccountStatus, CloudAccount, CloudQuotaData, CloudTokenData, ModelQuota, Provider,
    RotatorConfig,
};
