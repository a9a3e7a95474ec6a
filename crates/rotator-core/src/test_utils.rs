//! In-memory fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rotator_types::{
    AccountError, AccountStatus, CloudAccount, CloudQuotaData, CloudTokenData, ProcessError,
    ProviderError,
};

use crate::error::{AppError, AppResult};
use crate::modules::account::AccountStore;
use crate::modules::injection::StateInjector;
use crate::modules::notification::{Notification, NotificationSink};
use crate::modules::process::ProcessController;
use crate::modules::provider::{IdentityProvider, TokenGrant, UserInfo};
use crate::modules::vault::OsProtector;

pub fn token(access: &str, refresh: &str, expires_in: i64) -> CloudTokenData {
    CloudTokenData::new(access.to_string(), refresh.to_string(), expires_in, None)
}

pub fn quota(models: &[(&str, f64)]) -> CloudQuotaData {
    let mut quota = CloudQuotaData::new();
    for (name, percentage) in models {
        quota.add_model(*name, *percentage, "");
    }
    quota
}

/// Inactive account with a valid token `{id}-access`; no quota when `models` is empty.
pub fn account_with_quota(id: &str, email: &str, models: &[(&str, f64)]) -> CloudAccount {
    let mut account = CloudAccount::new(
        id.to_string(),
        email.to_string(),
        token(&format!("{id}-access"), &format!("{id}-refresh"), 3600),
    );
    if !models.is_empty() {
        account.quota = Some(quota(models));
    }
    account
}

/// Reversible "OS protection" that counts its calls.
#[derive(Default)]
pub struct XorProtector {
    pub protect_calls: AtomicUsize,
    pub unprotect_calls: AtomicUsize,
}

impl OsProtector for XorProtector {
    fn is_available(&self) -> bool {
        true
    }

    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, String> {
        self.protect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(plaintext.iter().map(|b| b ^ 0x5A).collect())
    }

    fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, String> {
        self.unprotect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(blob.iter().map(|b| b ^ 0x5A).collect())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<CloudAccount>>,
    settings: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn with_accounts(accounts: Vec<CloudAccount>) -> Self {
        Self { accounts: Mutex::new(accounts), settings: Mutex::default() }
    }

    pub fn account(&self, id: &str) -> CloudAccount {
        self.accounts
            .lock()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no account {id}"))
    }

    pub fn snapshot(&self) -> Vec<CloudAccount> {
        self.accounts.lock().clone()
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.settings.lock().insert(key.to_string(), serde_json::Value::Bool(value));
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut CloudAccount)) -> AppResult<()> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AccountError::NotFound { id: id.to_string() })?;
        f(account);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_accounts(&self) -> AppResult<Vec<CloudAccount>> {
        Ok(self.snapshot())
    }

    async fn get_account(&self, id: &str) -> AppResult<Option<CloudAccount>> {
        Ok(self.accounts.lock().iter().find(|a| a.id == id).cloned())
    }

    async fn add_account(&self, account: CloudAccount) -> AppResult<()> {
        let mut accounts = self.accounts.lock();
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
        Ok(())
    }

    async fn remove_account(&self, id: &str) -> AppResult<()> {
        self.accounts.lock().retain(|a| a.id != id);
        Ok(())
    }

    async fn update_token(&self, id: &str, token: &CloudTokenData) -> AppResult<()> {
        self.modify(id, |a| a.token = token.clone())
    }

    async fn update_quota(&self, id: &str, quota: &CloudQuotaData) -> AppResult<()> {
        self.modify(id, |a| a.quota = Some(quota.clone()))
    }

    async fn update_status(&self, id: &str, status: AccountStatus) -> AppResult<()> {
        self.modify(id, |a| a.status = status)
    }

    async fn update_last_used(&self, id: &str) -> AppResult<()> {
        self.modify(id, CloudAccount::update_last_used)
    }

    async fn set_active(&self, id: &str) -> AppResult<()> {
        let mut accounts = self.accounts.lock();
        if !accounts.iter().any(|a| a.id == id) {
            return Err(AccountError::NotFound { id: id.to_string() }.into());
        }
        for account in accounts.iter_mut() {
            account.is_active = account.id == id;
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        Ok(self.settings.lock().get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: serde_json::Value) -> AppResult<()> {
        self.settings.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Provider with scripted answers.
///
/// Refreshes hand out `refreshed-{n}`. Quota for an unscripted token is 100% gemini.
pub struct ScriptedProvider {
    refresh_calls: AtomicUsize,
    quota_calls: AtomicUsize,
    refresh_delay: Duration,
    refresh_error: Mutex<Option<ProviderError>>,
    quotas: Mutex<HashMap<String, CloudQuotaData>>,
    quota_failures: Mutex<VecDeque<ProviderError>>,
    quota_delay: Mutex<Duration>,
    quota_tokens: Mutex<Vec<String>>,
    user: Mutex<UserInfo>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            quota_calls: AtomicUsize::new(0),
            refresh_delay: Duration::ZERO,
            refresh_error: Mutex::new(None),
            quotas: Mutex::default(),
            quota_failures: Mutex::default(),
            quota_delay: Mutex::new(Duration::ZERO),
            quota_tokens: Mutex::default(),
            user: Mutex::new(UserInfo {
                email: "user@example.com".to_string(),
                name: Some("User".to_string()),
                picture: None,
            }),
        }
    }
}

impl ScriptedProvider {
    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Every later refresh fails with `err`.
    pub fn fail_refresh(&self, err: ProviderError) {
        *self.refresh_error.lock() = Some(err);
    }

    pub fn set_quota(&self, access_token: &str, quota: CloudQuotaData) {
        self.quotas.lock().insert(access_token.to_string(), quota);
    }

    /// The next quota call fails with `err`.
    pub fn fail_quota_once(&self, err: ProviderError) {
        self.quota_failures.lock().push_back(err);
    }

    pub fn set_quota_delay(&self, delay: Duration) {
        *self.quota_delay.lock() = delay;
    }

    pub fn set_user(&self, user: UserInfo) {
        *self.user.lock() = user;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn quota_calls(&self) -> usize {
        self.quota_calls.load(Ordering::SeqCst)
    }

    /// Access tokens presented to `fetch_quota`, in order.
    pub fn quota_tokens(&self) -> Vec<String> {
        self.quota_tokens.lock().clone()
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ProviderError> {
        Ok(TokenGrant {
            access_token: "code-access".to_string(),
            expires_in: 3600,
            token_type: "Bearer".to_string(),
            refresh_token: Some("code-refresh".to_string()),
        })
    }

    async fn get_user_info(&self, _access_token: &str) -> Result<UserInfo, ProviderError> {
        Ok(self.user.lock().clone())
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let scripted = self.refresh_error.lock().clone();
        if let Some(err) = scripted {
            return Err(err);
        }
        Ok(TokenGrant {
            access_token: format!("refreshed-{n}"),
            expires_in: 3600,
            token_type: "Bearer".to_string(),
            refresh_token: None,
        })
    }

    async fn fetch_quota(&self, access_token: &str) -> Result<CloudQuotaData, ProviderError> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        self.quota_tokens.lock().push(access_token.to_string());
        let delay = *self.quota_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failure = self.quota_failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        let scripted = self.quotas.lock().get(access_token).cloned();
        Ok(scripted.unwrap_or_else(|| quota(&[("gemini", 100.0)])))
    }
}

/// Target application double. Records `close`, `wait` and `start` in call order.
pub struct FakeProcess {
    running: Mutex<bool>,
    stay_running: Mutex<bool>,
    start_error: Mutex<Option<ProcessError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeProcess {
    fn with_running(running: bool) -> Self {
        Self {
            running: Mutex::new(running),
            stay_running: Mutex::new(false),
            start_error: Mutex::new(None),
            calls: Mutex::default(),
        }
    }

    pub fn running() -> Self {
        Self::with_running(true)
    }

    pub fn stopped() -> Self {
        Self::with_running(false)
    }

    /// `close` no longer makes the application exit.
    pub fn stay_running(&self) {
        *self.stay_running.lock() = true;
    }

    pub fn fail_start(&self, err: ProcessError) {
        *self.start_error.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessController for FakeProcess {
    async fn is_running(&self) -> bool {
        *self.running.lock()
    }

    async fn close(&self) -> Result<(), ProcessError> {
        self.calls.lock().push("close");
        if !*self.stay_running.lock() {
            *self.running.lock() = false;
        }
        Ok(())
    }

    async fn wait_for_exit(&self, timeout: Duration) -> Result<(), ProcessError> {
        self.calls.lock().push("wait");
        if *self.running.lock() {
            return Err(ProcessError::ExitTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    async fn start(&self, _use_uri: bool) -> Result<(), ProcessError> {
        self.calls.lock().push("start");
        let scripted = self.start_error.lock().clone();
        if let Some(err) = scripted {
            return Err(err);
        }
        *self.running.lock() = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<(), String> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingInjector {
    backup: Option<PathBuf>,
    inject_error: Mutex<Option<String>>,
    injected: Mutex<Vec<String>>,
    restored: AtomicUsize,
}

impl RecordingInjector {
    /// `backup` reports a file it pretends to have copied.
    pub fn with_backup() -> Self {
        Self { backup: Some(PathBuf::from("state.vscdb.backup")), ..Self::default() }
    }

    pub fn fail_inject(&self, message: &str) {
        *self.inject_error.lock() = Some(message.to_string());
    }

    /// Ids of the accounts injected so far.
    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().clone()
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateInjector for RecordingInjector {
    async fn backup(&self) -> AppResult<Option<PathBuf>> {
        Ok(self.backup.clone())
    }

    async fn restore(&self, _backup: &Path) -> AppResult<()> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn inject(&self, account: &CloudAccount) -> AppResult<()> {
        let scripted = self.inject_error.lock().clone();
        if let Some(message) = scripted {
            return Err(AppError::Database(message));
        }
        self.injected.lock().push(account.id.clone());
        Ok(())
    }
}
