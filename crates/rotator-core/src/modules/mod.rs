//! Credential vault, account store, provider client, and the rotation machinery.

pub mod account;
pub mod config;
pub mod injection;
pub mod monitor;
pub mod notification;
pub mod process;
pub mod provider;
pub mod quota;
pub mod rotation;
pub mod token;
pub mod vault;
