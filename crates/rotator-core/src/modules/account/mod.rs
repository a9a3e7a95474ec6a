//! Persisted account store.
//!
//! The rest of the core talks to [`AccountStore`]; [`JsonAccountStore`] is the
//! on-disk implementation that keeps token and quota fields encrypted by the vault.

mod json_store;
mod store;

pub use json_store::{JsonAccountStore, ACCOUNTS_FILE, SETTINGS_FILE};
pub use store::{AccountStore, SETTING_AUTO_SWITCH};
