//! The process root: owns every rotation component and exposes the operations the
//! UI / daemon layer calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rotator_types::{AccountError, CloudAccount, CloudTokenData, Provider, RotatorConfig};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::modules::account::{AccountStore, JsonAccountStore, SETTING_AUTO_SWITCH};
use crate::modules::config::load_or_init_config;
use crate::modules::injection::{SqliteStateInjector, StateInjector};
use crate::modules::monitor::{PollTrigger, QuotaPoller};
use crate::modules::notification::{LogSink, NotificationGateway, NotificationSink};
use crate::modules::process::{ProcessController, SystemProcessController};
use crate::modules::provider::{GoogleProvider, IdentityProvider, OAuthClient};
use crate::modules::quota::QuotaRefresher;
use crate::modules::rotation::{AutoSwitcher, SwitchOrchestrator};
use crate::modules::token::TokenCoordinator;
use crate::modules::vault::{UnavailableProtector, Vault};

/// Collaborators the service is assembled from.
pub struct ServiceParts {
    pub store: Arc<dyn AccountStore>,
    pub provider: Arc<dyn IdentityProvider>,
    pub process: Arc<dyn ProcessController>,
    pub injector: Arc<dyn StateInjector>,
    pub sink: Arc<dyn NotificationSink>,
}

pub struct RotationService {
    config: RotatorConfig,
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn IdentityProvider>,
    quota: QuotaRefresher,
    orchestrator: Arc<SwitchOrchestrator>,
    auto: Arc<AutoSwitcher>,
    notifier: Arc<NotificationGateway>,
    poller: Arc<QuotaPoller>,
}

impl RotationService {
    pub fn new(config: RotatorConfig, parts: ServiceParts) -> Self {
        let ServiceParts { store, provider, process, injector, sink } = parts;

        let notifier = Arc::new(NotificationGateway::new(config.notifications.enabled, sink));
        let tokens = TokenCoordinator::new(Arc::clone(&store), Arc::clone(&provider));
        let quota = QuotaRefresher::new(Arc::clone(&store), Arc::clone(&provider), tokens.clone());
        let orchestrator = Arc::new(SwitchOrchestrator::new(
            Arc::clone(&store),
            tokens.clone(),
            process,
            injector,
            Duration::from_secs(config.switch.exit_timeout_secs),
        ));
        let auto = Arc::new(AutoSwitcher::new(
            Arc::clone(&store),
            Arc::clone(&orchestrator),
            Arc::clone(&notifier),
            config.notifications.switch_threshold(),
        ));
        let poller = QuotaPoller::new(
            Arc::clone(&store),
            tokens,
            quota.clone(),
            Arc::clone(&auto),
            Arc::clone(&notifier),
            config.monitor,
            config.notifications.clone(),
        );

        Self { config, store, provider, quota, orchestrator, auto, notifier, poller }
    }

    /// Default wiring on top of `data_dir`: encrypted JSON store, Google provider,
    /// real process control, SQLite injection, log notifications.
    pub fn open(data_dir: &Path, oauth: OAuthClient) -> AppResult<Self> {
        let config = load_or_init_config(data_dir)?;
        let vault = Arc::new(Vault::with_default_strategies(
            data_dir,
            Arc::new(UnavailableProtector),
            &config.vault,
        ));
        let parts = ServiceParts {
            store: Arc::new(JsonAccountStore::new(data_dir, vault)),
            provider: Arc::new(GoogleProvider::new(oauth).map_err(AppError::Config)?),
            process: Arc::new(SystemProcessController::new(
                config.target.clone(),
                config.switch,
            )?),
            injector: Arc::new(SqliteStateInjector::from_config(&config.target)?),
            sink: Arc::new(LogSink),
        };
        info!("[Service] Opened data directory {}", data_dir.display());
        Ok(Self::new(config, parts))
    }

    pub const fn config(&self) -> &RotatorConfig {
        &self.config
    }

    /// Start monitoring: an initial poll that never switches, then the timer.
    /// The returned handle resolves when the initial poll is done.
    pub fn init(&self) -> JoinHandle<bool> {
        info!("[Service] Starting quota monitor");
        let poller = Arc::clone(&self.poller);
        let initial = tokio::spawn(async move { poller.poll(PollTrigger::Startup).await });
        self.poller.start();
        initial
    }

    pub fn shutdown(&self) {
        self.poller.stop();
        info!("[Service] Shut down");
    }

    pub async fn refresh_account_quota(&self, account_id: &str) -> AppResult<CloudAccount> {
        self.quota.refresh_account_quota(account_id).await
    }

    /// Manual switch to `account_id`.
    pub async fn switch_cloud_account(&self, account_id: &str) -> AppResult<CloudAccount> {
        self.orchestrator.switch_to(account_id).await
    }

    pub async fn get_auto_switch_enabled(&self) -> AppResult<bool> {
        self.auto.is_enabled().await
    }

    /// Persist the flag. Enabling also starts a poll; its handle is returned so a
    /// short-lived caller can wait for it instead of cutting a switch short.
    pub async fn set_auto_switch_enabled(
        &self,
        enabled: bool,
    ) -> AppResult<Option<JoinHandle<bool>>> {
        self.store.set_setting(SETTING_AUTO_SWITCH, serde_json::Value::Bool(enabled)).await?;
        info!("[Service] Auto-switch {}", if enabled { "enabled" } else { "disabled" });
        if !enabled {
            return Ok(None);
        }
        let poller = Arc::clone(&self.poller);
        Ok(Some(tokio::spawn(async move { poller.poll(PollTrigger::Manual).await })))
    }

    /// Poll now. `false` when a poll was already running.
    pub async fn force_poll_cloud_monitor(&self) -> bool {
        self.poller.poll(PollTrigger::Manual).await
    }

    pub async fn check_and_switch_if_needed(&self) -> AppResult<bool> {
        self.auto.check_and_switch_if_needed().await
    }

    pub async fn handle_app_focus(&self) -> bool {
        self.poller.handle_app_focus().await
    }

    /// Onboard the identity behind an authorization code. The first account added
    /// becomes the active one; the initial quota fetch is best effort.
    pub async fn add_account_from_code(&self, code: &str) -> AppResult<CloudAccount> {
        let grant = self.provider.exchange_code(code).await?;
        let user = self.provider.get_user_info(&grant.access_token).await?;

        let mut token = CloudTokenData::new(
            grant.access_token,
            grant.refresh_token.unwrap_or_default(),
            grant.expires_in,
            Some(user.email.clone()),
        );
        token.token_type = grant.token_type;

        let mut account =
            CloudAccount::new(uuid::Uuid::new_v4().to_string(), user.email.clone(), token);
        account.provider = Provider::Google;
        account.name = Some(user.name.filter(|n| !n.trim().is_empty()).unwrap_or(user.email));
        account.avatar_url = user.picture;

        let first = self.store.get_accounts().await?.is_empty();
        self.store.add_account(account.clone()).await?;
        if first {
            self.store.set_active(&account.id).await?;
            account.is_active = true;
        }
        info!("[Service] Added account {}", account.email);

        match self.provider.fetch_quota(&account.token.access_token).await {
            Ok(quota) => {
                self.store.update_quota(&account.id, &quota).await?;
                account.update_quota(quota);
            },
            Err(e) => warn!("[Service] Failed to fetch initial quota for {}: {}", account.email, e),
        }
        Ok(account)
    }

    pub async fn list_accounts(&self) -> AppResult<Vec<CloudAccount>> {
        self.store.get_accounts().await
    }

    pub async fn get_account(&self, account_id: &str) -> AppResult<CloudAccount> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| AccountError::NotFound { id: account_id.to_string() }.into())
    }

    /// Removing the active account leaves none active until the next switch.
    pub async fn delete_account(&self, account_id: &str) -> AppResult<()> {
        self.store.remove_account(account_id).await?;
        info!("[Service] Deleted account {}", account_id);
        Ok(())
    }

    pub fn clear_notification_cache(&self) {
        self.notifier.clear_debounce_cache();
    }
}

/// Default data directory (see [`crate::utils::paths::get_data_dir`]).
pub fn default_data_dir() -> AppResult<PathBuf> {
    crate::utils::paths::get_data_dir().map_err(AppError::Config)
}
