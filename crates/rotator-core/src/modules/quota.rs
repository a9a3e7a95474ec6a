//! Quota refresh for one account.
//!
//! Shared by the poller and the on-demand `refresh_account_quota` entry point.

use std::sync::Arc;

use rotator_types::{AccountError, AccountStatus, CloudAccount, CloudQuotaData, ProviderError};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::modules::account::AccountStore;
use crate::modules::provider::IdentityProvider;
use crate::modules::token::TokenCoordinator;
use crate::utils::single_flight::SingleFlight;

#[derive(Clone)]
pub struct QuotaRefresher {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn IdentityProvider>,
    tokens: TokenCoordinator,
    flights: SingleFlight<String, CloudAccount, AppError>,
}

impl QuotaRefresher {
    pub fn new(
        store: Arc<dyn AccountStore>,
        provider: Arc<dyn IdentityProvider>,
        tokens: TokenCoordinator,
    ) -> Self {
        Self { store, provider, tokens, flights: SingleFlight::new() }
    }

    /// On-demand refresh: fetch and persist quota and mark the account used.
    /// Concurrent calls for the same id share one fetch.
    pub async fn refresh_account_quota(&self, account_id: &str) -> AppResult<CloudAccount> {
        let this = self.clone();
        let id = account_id.to_string();
        self.flights
            .run(format!("quota-{account_id}"), move || async move {
                let account = this
                    .store
                    .get_account(&id)
                    .await?
                    .ok_or_else(|| AccountError::NotFound { id: id.clone() })?;
                let mut account = this.fetch_and_store(&account).await?;
                this.store.update_last_used(&id).await?;
                account.update_last_used();
                Ok(account)
            })
            .await
    }

    /// Fetch quota with a fresh token and persist it.
    ///
    /// A 401 forces one token refresh and one retry. A 403 marks the account
    /// `rate_limited`. Success restores a `rate_limited` account to `active`.
    pub async fn fetch_and_store(&self, account: &CloudAccount) -> AppResult<CloudAccount> {
        let mut account = self.tokens.ensure_fresh(account).await?;

        let quota = match self.provider.fetch_quota(&account.token.access_token).await {
            Err(e) if e.is_unauthorized() => {
                warn!("[Quota] 401 for {}, forcing token refresh and retrying", account.email);
                account = self.tokens.refresh_and_save_token(&account).await?;
                self.provider.fetch_quota(&account.token.access_token).await
            },
            other => other,
        };

        match quota {
            Ok(quota) => {
                self.persist_quota(&mut account, quota).await?;
                Ok(account)
            },
            Err(source) => Err(self.quota_failure(&mut account, source).await),
        }
    }

    async fn persist_quota(&self, account: &mut CloudAccount, quota: CloudQuotaData) -> AppResult<()> {
        self.store.update_quota(&account.id, &quota).await?;
        account.update_quota(quota);
        if account.status == AccountStatus::RateLimited {
            info!("[Quota] {} is serving again, restoring to active", account.email);
            self.store.update_status(&account.id, AccountStatus::Active).await?;
            account.status = AccountStatus::Active;
        }
        Ok(())
    }

    async fn quota_failure(&self, account: &mut CloudAccount, source: ProviderError) -> AppError {
        if source.is_forbidden() {
            warn!("[Quota] 403 for {}, marking rate limited", account.email);
            match self.store.update_status(&account.id, AccountStatus::RateLimited).await {
                Ok(()) => account.status = AccountStatus::RateLimited,
                Err(e) => warn!("[Quota] Failed to persist status for {}: {}", account.email, e),
            }
        }
        AccountError::QuotaCheckFailed { id: account.id.clone(), source }.into()
    }
}
