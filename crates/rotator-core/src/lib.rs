//! # Rotator Core
//!
//! Credential rotation for the externally controlled application.
//!
//! ```text
//! rotator-core/src/
//! ├── modules/vault/        # AES-256-GCM envelope, master key strategies
//! ├── modules/account/      # AccountStore trait + encrypted JSON store
//! ├── modules/provider/     # IdentityProvider trait + Google client
//! ├── modules/token.rs      # single-flight token refresh
//! ├── modules/quota.rs      # quota refresh with 401 retry / 403 handling
//! ├── modules/monitor.rs    # quota poller (timer + focus)
//! ├── modules/rotation/     # policy, switch procedure, auto-switch
//! ├── modules/process/      # detect / close / start the target
//! ├── modules/injection.rs  # credential injection into state.vscdb
//! ├── modules/notification.rs
//! └── service.rs            # RotationService, the process root
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards in async code require careful lifetime management"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(clippy::implicit_clone, reason = "Explicit .clone() vs .to_string() is stylistic")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Quota types hold f64 and intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::unwrap_used,
        clippy::assertions_on_result_states
    )
)]

pub mod error;
pub mod modules;
pub mod service;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use modules::account::{AccountStore, JsonAccountStore};
pub use modules::notification::{LogSink, NotificationGateway, NotificationSink};
pub use modules::process::{ProcessController, SystemProcessController};
pub use modules::provider::{GoogleProvider, IdentityProvider};
pub use modules::rotation::SwitchStage;
pub use modules::vault::Vault;
pub use service::{RotationService, ServiceParts};
