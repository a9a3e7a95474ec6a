//! JSON-file account store with vault-encrypted secret fields.
//!
//! `cloud_accounts.json` holds every account; `token` and `quota` are stored as vault
//! envelopes of their JSON form. `settings.json` is a flat key-value object. Both
//! files are replaced atomically, and read-modify-write cycles are serialized by a
//! store-owned lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rotator_types::{
    AccountError, AccountStatus, CloudAccount, CloudQuotaData, CloudTokenData, Provider,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::AccountStore;
use crate::error::{AppError, AppResult};
use crate::modules::vault::Vault;
use crate::utils::fs::atomic_write;

pub const ACCOUNTS_FILE: &str = "cloud_accounts.json";
pub const SETTINGS_FILE: &str = "settings.json";

const FILE_VERSION: u32 = 1;

/// On-disk shape of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccount {
    id: String,
    #[serde(default)]
    provider: Provider,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    /// Vault envelope (or legacy plaintext) of the token JSON
    token: String,
    /// Vault envelope (or legacy plaintext) of the quota JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota: Option<String>,
    #[serde(default)]
    status: AccountStatus,
    #[serde(default)]
    is_active: bool,
    created_at: i64,
    last_used: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    accounts: Vec<StoredAccount>,
}

type SettingsFile = serde_json::Map<String, serde_json::Value>;

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> AppResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).map_err(|e| {
        AppError::from(AccountError::StorageError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    atomic_write(path, content.as_bytes()).map_err(|e| {
        AppError::from(AccountError::StorageError {
            message: format!("Failed to write {}: {}", path.display(), e),
        })
    })
}

fn not_found(id: &str) -> AppError {
    AccountError::NotFound { id: id.to_string() }.into()
}

/// Account store backed by two JSON files in the data directory.
pub struct JsonAccountStore {
    accounts_path: PathBuf,
    settings_path: PathBuf,
    vault: Arc<Vault>,
    write_lock: Mutex<()>,
}

impl JsonAccountStore {
    pub fn new(data_dir: &Path, vault: Arc<Vault>) -> Self {
        Self {
            accounts_path: data_dir.join(ACCOUNTS_FILE),
            settings_path: data_dir.join(SETTINGS_FILE),
            vault,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> AppResult<AccountsFile> {
        let path = self.accounts_path.clone();
        tokio::task::spawn_blocking(move || read_json::<AccountsFile>(&path)).await?
    }

    async fn save(&self, mut file: AccountsFile) -> AppResult<()> {
        file.version = FILE_VERSION;
        let path = self.accounts_path.clone();
        tokio::task::spawn_blocking(move || write_json(&path, &file)).await?
    }

    async fn load_settings(&self) -> AppResult<SettingsFile> {
        let path = self.settings_path.clone();
        tokio::task::spawn_blocking(move || read_json::<SettingsFile>(&path)).await?
    }

    async fn seal_json<T: Serialize + Sync>(&self, value: &T) -> AppResult<String> {
        let json = serde_json::to_string(value)?;
        Ok(self.vault.encrypt(&json).await?)
    }

    async fn open_json<T: DeserializeOwned>(&self, sealed: &str) -> AppResult<T> {
        let json = self.vault.decrypt(sealed).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn seal(&self, account: &CloudAccount) -> AppResult<StoredAccount> {
        let token = self.seal_json(&account.token).await?;
        let quota = match &account.quota {
            Some(q) => Some(self.seal_json(q).await?),
            None => None,
        };
        Ok(StoredAccount {
            id: account.id.clone(),
            provider: account.provider,
            email: account.email.clone(),
            name: account.name.clone(),
            avatar_url: account.avatar_url.clone(),
            token,
            quota,
            status: account.status,
            is_active: account.is_active,
            created_at: account.created_at,
            last_used: account.last_used,
        })
    }

    async fn open(&self, stored: StoredAccount) -> AppResult<CloudAccount> {
        let token: CloudTokenData = self.open_json(&stored.token).await?;
        let quota = match &stored.quota {
            Some(sealed) => Some(self.open_json::<CloudQuotaData>(sealed).await?),
            None => None,
        };
        Ok(CloudAccount {
            id: stored.id,
            provider: stored.provider,
            email: stored.email,
            name: stored.name,
            avatar_url: stored.avatar_url,
            token,
            quota,
            status: stored.status,
            is_active: stored.is_active,
            created_at: stored.created_at,
            last_used: stored.last_used,
        })
    }

    /// Load, apply `change` to account `id`, save. Holds the write lock throughout.
    ///
    /// The record is opened and sealed again in full, so a legacy plaintext field is
    /// encrypted by whichever update touches the account next.
    async fn modify<F>(&self, id: &str, change: F) -> AppResult<()>
    where
        F: FnOnce(&mut CloudAccount) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let index = file.accounts.iter().position(|a| a.id == id).ok_or_else(|| not_found(id))?;
        let mut account = self.open(file.accounts[index].clone()).await?;
        change(&mut account);
        file.accounts[index] = self.seal(&account).await?;
        self.save(file).await
    }
}

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn get_accounts(&self) -> AppResult<Vec<CloudAccount>> {
        let file = self.load().await?;
        let mut accounts = Vec::with_capacity(file.accounts.len());

        for stored in file.accounts {
            let id = stored.id.clone();
            match self.open(stored).await {
                Ok(account) => accounts.push(account),
                Err(e) if e.is_key_storage_unavailable() => return Err(e),
                Err(e) => warn!("[Accounts] Skipping unreadable account {}: {}", id, e),
            }
        }

        Ok(accounts)
    }

    async fn get_account(&self, id: &str) -> AppResult<Option<CloudAccount>> {
        let file = self.load().await?;
        match file.accounts.into_iter().find(|a| a.id == id) {
            Some(stored) => Ok(Some(self.open(stored).await?)),
            None => Ok(None),
        }
    }

    async fn add_account(&self, account: CloudAccount) -> AppResult<()> {
        let stored = self.seal(&account).await?;
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        match file.accounts.iter_mut().find(|a| a.id == stored.id) {
            Some(existing) => *existing = stored,
            None => file.accounts.push(stored),
        }
        self.save(file).await?;
        debug!("[Accounts] Saved account {} ({})", account.email, account.id);
        Ok(())
    }

    async fn remove_account(&self, id: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let before = file.accounts.len();
        file.accounts.retain(|a| a.id != id);
        if file.accounts.len() == before {
            return Err(not_found(id));
        }
        self.save(file).await
    }

    async fn update_token(&self, id: &str, token: &CloudTokenData) -> AppResult<()> {
        let token = token.clone();
        self.modify(id, move |a| a.token = token).await
    }

    async fn update_quota(&self, id: &str, quota: &CloudQuotaData) -> AppResult<()> {
        let quota = quota.clone();
        self.modify(id, move |a| a.quota = Some(quota)).await
    }

    async fn update_status(&self, id: &str, status: AccountStatus) -> AppResult<()> {
        self.modify(id, move |a| a.status = status).await
    }

    async fn update_last_used(&self, id: &str) -> AppResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.modify(id, move |a| a.last_used = now).await
    }

    async fn set_active(&self, id: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        if !file.accounts.iter().any(|a| a.id == id) {
            return Err(not_found(id));
        }
        for account in &mut file.accounts {
            account.is_active = account.id == id;
        }
        self.save(file).await
    }

    async fn get_setting(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        Ok(self.load_settings().await?.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: serde_json::Value) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load_settings().await?;
        let _ = settings.insert(key.to_string(), value);
        let path = self.settings_path.clone();
        tokio::task::spawn_blocking(move || write_json(&path, &settings)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::account::SETTING_AUTO_SWITCH;
    use crate::modules::vault::{parse_envelope, FallbackKeyFile};
    use crate::test_utils::{account_with_quota, token};

    fn store_in(dir: &Path) -> JsonAccountStore {
        let vault = Vault::new(vec![Box::new(FallbackKeyFile::new(dir.join(".mk.fallback")))]);
        JsonAccountStore::new(dir, Arc::new(vault))
    }

    #[tokio::test]
    async fn test_secrets_are_encrypted_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let account = account_with_quota("a1", "a@example.com", &[("gemini-pro", 42.0)]);

        store.add_account(account.clone()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(ACCOUNTS_FILE)).unwrap();
        assert!(raw.contains("a@example.com"));
        assert!(!raw.contains(&account.token.access_token));
        assert!(!raw.contains(&account.token.refresh_token));
        assert!(!raw.contains("gemini-pro"));

        assert_eq!(store.get_account("a1").await.unwrap(), Some(account));
    }

    #[tokio::test]
    async fn test_set_active_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        for id in ["a", "b", "c"] {
            store.add_account(account_with_quota(id, &format!("{id}@x.io"), &[])).await.unwrap();
        }

        store.set_active("a").await.unwrap();
        store.set_active("c").await.unwrap();

        let active: Vec<String> = store
            .get_accounts()
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_active)
            .map(|a| a.id)
            .collect();
        assert_eq!(active, vec!["c".to_string()]);
        assert!(matches!(
            store.set_active("missing").await,
            Err(AppError::Account(AccountError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_field_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_account(account_with_quota("a", "a@x.io", &[])).await.unwrap();

        let new_token = token("fresh", "keep", 3600);
        store.update_token("a", &new_token).await.unwrap();
        let mut quota = CloudQuotaData::new();
        quota.add_model("claude", 12.0, "");
        store.update_quota("a", &quota).await.unwrap();
        store.update_status("a", AccountStatus::RateLimited).await.unwrap();

        let loaded = store.get_account("a").await.unwrap().unwrap();
        assert_eq!(loaded.token, new_token);
        assert_eq!(loaded.quota, Some(quota));
        assert_eq!(loaded.status, AccountStatus::RateLimited);

        store.remove_account("a").await.unwrap();
        assert_eq!(store.get_account("a").await.unwrap(), None);
        assert!(store.remove_account("a").await.is_err());
    }

    #[tokio::test]
    async fn test_legacy_plaintext_record_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_token = token("legacy-access", "legacy-refresh", 100);
        let file = serde_json::json!({
            "accounts": [{
                "id": "old",
                "email": "old@x.io",
                "token": serde_json::to_string(&legacy_token).unwrap(),
                "created_at": 1,
                "last_used": 1
            }]
        });
        std::fs::write(dir.path().join(ACCOUNTS_FILE), file.to_string()).unwrap();

        let store = store_in(dir.path());
        let account = store.get_account("old").await.unwrap().unwrap();
        assert_eq!(account.token, legacy_token);
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_any_write_reseals_legacy_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_token = token("legacy-access", "legacy-refresh", 100);
        let file = serde_json::json!({
            "accounts": [{
                "id": "old",
                "email": "old@x.io",
                "token": serde_json::to_string(&legacy_token).unwrap(),
                "created_at": 1,
                "last_used": 1
            }]
        });
        std::fs::write(dir.path().join(ACCOUNTS_FILE), file.to_string()).unwrap();

        let store = store_in(dir.path());
        store.update_status("old", AccountStatus::RateLimited).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(ACCOUNTS_FILE)).unwrap();
        assert!(!raw.contains("legacy-access"));
        assert!(!raw.contains("legacy-refresh"));
        let on_disk: AccountsFile = read_json(&dir.path().join(ACCOUNTS_FILE)).unwrap();
        assert!(matches!(parse_envelope(&on_disk.accounts[0].token), Ok(Some(_))));

        let account = store.get_account("old").await.unwrap().unwrap();
        assert_eq!(account.token, legacy_token);
        assert_eq!(account.status, AccountStatus::RateLimited);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_skipped_in_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_account(account_with_quota("good", "g@x.io", &[])).await.unwrap();

        let mut file: AccountsFile = read_json(&dir.path().join(ACCOUNTS_FILE)).unwrap();
        let mut broken = file.accounts[0].clone();
        broken.id = "broken".to_string();
        broken.token = format!("{}:{}:00", "00".repeat(16), "00".repeat(16));
        file.accounts.push(broken);
        write_json(&dir.path().join(ACCOUNTS_FILE), &file).unwrap();

        let ids: Vec<String> =
            store.get_accounts().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["good".to_string()]);
        assert!(store.get_account("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.get_bool_setting(SETTING_AUTO_SWITCH, false).await.unwrap());
        store.set_setting(SETTING_AUTO_SWITCH, serde_json::Value::Bool(true)).await.unwrap();
        assert!(store.get_bool_setting(SETTING_AUTO_SWITCH, false).await.unwrap());
        assert!(dir.path().join(SETTINGS_FILE).exists());
    }
}
