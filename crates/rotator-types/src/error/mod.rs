//! Typed error definitions for the rotator.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for IPC responses via serde
//! - **Cloneable** so one failure can be shared by every waiter of a single-flight operation
//! - **Matchable** for error handling logic via enum variants

mod account;
mod process;
mod provider;
mod vault;

pub use account::AccountError;
pub use process::ProcessError;
pub use provider::ProviderError;
pub use vault::VaultError;
