//! Account store interface.

use async_trait::async_trait;
use rotator_types::{AccountStatus, CloudAccount, CloudQuotaData, CloudTokenData};

use crate::error::AppResult;

/// Settings key holding the auto-switch flag.
pub const SETTING_AUTO_SWITCH: &str = "auto_switch_enabled";

/// Persisted accounts and flat settings. Implementations hand out decrypted
/// in-memory accounts only.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All readable accounts, in stored order.
    async fn get_accounts(&self) -> AppResult<Vec<CloudAccount>>;

    async fn get_account(&self, id: &str) -> AppResult<Option<CloudAccount>>;

    /// Insert, or replace the account with the same id.
    async fn add_account(&self, account: CloudAccount) -> AppResult<()>;

    async fn remove_account(&self, id: &str) -> AppResult<()>;

    async fn update_token(&self, id: &str, token: &CloudTokenData) -> AppResult<()>;

    async fn update_quota(&self, id: &str, quota: &CloudQuotaData) -> AppResult<()>;

    async fn update_status(&self, id: &str, status: AccountStatus) -> AppResult<()>;

    /// Set `last_used` to now.
    async fn update_last_used(&self, id: &str) -> AppResult<()>;

    /// Mark `id` active and every other account inactive.
    async fn set_active(&self, id: &str) -> AppResult<()>;

    async fn get_setting(&self, key: &str) -> AppResult<Option<serde_json::Value>>;

    async fn set_setting(&self, key: &str, value: serde_json::Value) -> AppResult<()>;

    /// Boolean setting with a default for absent or non-boolean values.
    async fn get_bool_setting(&self, key: &str, default: bool) -> AppResult<bool> {
        Ok(self.get_setting(key).await?.and_then(|v| v.as_bool()).unwrap_or(default))
    }

    /// The account currently flagged `is_active`, if any.
    async fn get_active_account(&self) -> AppResult<Option<CloudAccount>> {
        Ok(self.get_accounts().await?.into_iter().find(|a| a.is_active))
    }
}
