//! Core domain models for the rotator.
//!
//! This module contains the data structures shared by the core and the daemon.

mod account;
mod config;
mod quota;
mod token;

// Re-export all models
pub use account::{AccountStatus, CloudAccount, Provider};
pub use config::{
    MonitorConfig, NotificationConfig, RotatorConfig, SwitchConfig, TargetAppConfig, VaultConfig,
};
pub use quota::{CloudQuotaData, ModelQuota};
pub use token::{CloudTokenData, REFRESH_BUFFER_SECS};
