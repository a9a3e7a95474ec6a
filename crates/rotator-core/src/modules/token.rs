//! Per-account OAuth token refresh.
//!
//! Refreshes are single-flight per account id: callers that arrive while a refresh is
//! running await that refresh instead of calling the provider again.

use std::sync::Arc;

use rotator_types::{AccountError, AccountStatus, CloudAccount, ProviderError};
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::modules::account::AccountStore;
use crate::modules::provider::IdentityProvider;
use crate::utils::single_flight::SingleFlight;

#[derive(Clone)]
pub struct TokenCoordinator {
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn IdentityProvider>,
    flights: SingleFlight<String, CloudAccount, crate::error::AppError>,
}

impl TokenCoordinator {
    pub fn new(store: Arc<dyn AccountStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { store, provider, flights: SingleFlight::new() }
    }

    /// Refresh the access token and persist it; returns the updated account.
    pub async fn refresh_and_save_token(&self, account: &CloudAccount) -> AppResult<CloudAccount> {
        let store = Arc::clone(&self.store);
        let provider = Arc::clone(&self.provider);
        let account = account.clone();
        self.flights
            .run(format!("token-{}", account.id), move || refresh_once(store, provider, account))
            .await
    }

    /// Refresh only when the token is inside the expiry buffer.
    pub async fn ensure_fresh(&self, account: &CloudAccount) -> AppResult<CloudAccount> {
        if account.token.needs_refresh() {
            info!("[Token] Token for {} is near expiry, refreshing", account.email);
            self.refresh_and_save_token(account).await
        } else {
            Ok(account.clone())
        }
    }

    pub fn is_refreshing(&self, account_id: &str) -> bool {
        self.flights.is_in_flight(&format!("token-{account_id}"))
    }
}

async fn refresh_once(
    store: Arc<dyn AccountStore>,
    provider: Arc<dyn IdentityProvider>,
    mut account: CloudAccount,
) -> AppResult<CloudAccount> {
    if !account.token.has_refresh_token() {
        warn!("[Token] {} has no refresh token; re-authorization required", account.email);
        return Err(AccountError::TokenRefreshFailed {
            id: account.id,
            source: ProviderError::MissingRefreshToken,
        }
        .into());
    }

    match provider.refresh_access_token(&account.token.refresh_token).await {
        Ok(grant) => {
            let now = chrono::Utc::now().timestamp();
            account.token.renew(grant.access_token, grant.expires_in, now);
            account.token.token_type = grant.token_type;
            if let Some(refresh) = grant.refresh_token.filter(|r| !r.trim().is_empty()) {
                account.token.refresh_token = refresh;
            }
            store.update_token(&account.id, &account.token).await?;
            info!(
                "[Token] Refreshed token for {} (expires at {})",
                account.email, account.token.expiry_timestamp
            );
            Ok(account)
        },
        Err(source) => {
            error!("[Token] Token refresh failed ({}): {}", account.email, source);
            let err = AccountError::TokenRefreshFailed { id: account.id.clone(), source };
            if err.should_expire_account() {
                warn!("[Token] Marking {} as expired (invalid_grant)", account.email);
                if let Err(e) = store.update_status(&account.id, AccountStatus::Expired).await {
                    warn!("[Token] Failed to persist expired status for {}: {}", account.email, e);
                }
            }
            Err(err.into())
        },
    }
}
