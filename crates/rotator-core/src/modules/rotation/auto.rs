//! Automatic rotation away from a depleted or rate-limited active account.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::policy::{find_best_account, needs_rotation};
use super::SwitchOrchestrator;
use crate::error::AppResult;
use crate::modules::account::{AccountStore, SETTING_AUTO_SWITCH};
use crate::modules::notification::NotificationGateway;

pub struct AutoSwitcher {
    store: Arc<dyn AccountStore>,
    orchestrator: Arc<SwitchOrchestrator>,
    notifier: Arc<NotificationGateway>,
    switch_threshold: f64,
}

impl AutoSwitcher {
    pub fn new(
        store: Arc<dyn AccountStore>,
        orchestrator: Arc<SwitchOrchestrator>,
        notifier: Arc<NotificationGateway>,
        switch_threshold: f64,
    ) -> Self {
        Self { store, orchestrator, notifier, switch_threshold }
    }

    pub async fn is_enabled(&self) -> AppResult<bool> {
        self.store.get_bool_setting(SETTING_AUTO_SWITCH, false).await
    }

    /// Returns `true` only when a switch happened.
    ///
    /// A failed switch is notified and returned as the error; it is not retried.
    pub async fn check_and_switch_if_needed(&self) -> AppResult<bool> {
        if !self.is_enabled().await? {
            debug!("[AutoSwitch] Disabled, skipping check");
            return Ok(false);
        }

        let accounts = self.store.get_accounts().await?;
        let Some(current) = accounts.iter().find(|a| a.is_active) else {
            debug!("[AutoSwitch] No active account");
            return Ok(false);
        };

        if !needs_rotation(current, self.switch_threshold) {
            return Ok(false);
        }
        info!(
            "[AutoSwitch] Current account {} is depleted or rate limited ({})",
            current.email, current.status
        );

        let best = find_best_account(&accounts, Some(current.id.as_str()), self.switch_threshold);
        let Some(next) = best else {
            warn!("[AutoSwitch] No healthy account available");
            self.notifier.all_depleted();
            return Ok(false);
        };

        info!("[AutoSwitch] Switching {} -> {}", current.email, next.email);
        match self.orchestrator.switch_to(&next.id).await {
            Ok(_) => {
                self.notifier.auto_switch_success(&current.email, &next.email);
                Ok(true)
            },
            Err(e) => {
                self.notifier.switch_failed(&current.email, &next.email, &e.to_string());
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::notification::NotificationKind;
    use crate::modules::token::TokenCoordinator;
    use crate::test_utils::{
        account_with_quota, FakeProcess, MemoryStore, RecordingInjector, RecordingSink,
        ScriptedProvider,
    };
    use rotator_types::{AccountStatus, CloudAccount, ProcessError};
    use std::time::Duration;

    struct Harness {
        auto: AutoSwitcher,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        process: Arc<FakeProcess>,
        injector: Arc<RecordingInjector>,
    }

    fn harness(accounts: Vec<CloudAccount>, enabled: bool) -> Harness {
        let store = Arc::new(MemoryStore::with_accounts(accounts));
        store.set_bool(SETTING_AUTO_SWITCH, enabled);
        let provider = Arc::new(ScriptedProvider::default());
        let process = Arc::new(FakeProcess::running());
        let injector = Arc::new(RecordingInjector::default());
        let orchestrator = Arc::new(SwitchOrchestrator::new(
            store.clone(),
            TokenCoordinator::new(store.clone(), provider),
            process.clone(),
            injector.clone(),
            Duration::from_millis(50),
        ));
        let sink = Arc::new(RecordingSink::default());
        let notifier = Arc::new(NotificationGateway::new(true, sink.clone()));
        Harness {
            auto: AutoSwitcher::new(store.clone(), orchestrator, notifier, 5.0),
            store,
            sink,
            process,
            injector,
        }
    }

    fn active(id: &str, email: &str, models: &[(&str, f64)]) -> CloudAccount {
        let mut account = account_with_quota(id, email, models);
        account.is_active = true;
        account
    }

    #[tokio::test]
    async fn test_depleted_active_switches_to_best_alternate() {
        let h = harness(
            vec![
                active("cur", "current@x", &[("gemini", 2.0)]),
                account_with_quota("alt", "alt@x", &[("gemini", 80.0)]),
            ],
            true,
        );

        assert!(h.auto.check_and_switch_if_needed().await.unwrap());
        assert!(h.store.account("alt").is_active);
        assert!(!h.store.account("cur").is_active);

        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::AutoSwitchSuccess);
        assert!(sent[0].body.contains("current@x"));
        assert!(sent[0].body.contains("alt@x"));
    }

    #[tokio::test]
    async fn test_disabled_auto_switch_touches_nothing() {
        let accounts = vec![
            active("cur", "current@x", &[("gemini", 2.0)]),
            account_with_quota("alt", "alt@x", &[("gemini", 80.0)]),
        ];
        let h = harness(accounts.clone(), false);

        assert!(!h.auto.check_and_switch_if_needed().await.unwrap());
        assert_eq!(h.store.snapshot(), accounts);
        assert!(h.sink.sent().is_empty());
        assert!(h.process.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_depleted_notifies_without_switching() {
        let h = harness(
            vec![
                active("cur", "current@x", &[("gemini", 2.0)]),
                account_with_quota("alt", "alt@x", &[("gemini", 3.0)]),
            ],
            true,
        );

        assert!(!h.auto.check_and_switch_if_needed().await.unwrap());
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::AllDepleted);
        assert!(h.process.calls().is_empty());
        assert!(h.injector.injected().is_empty());
        assert!(h.store.account("cur").is_active);
    }

    #[tokio::test]
    async fn test_rate_limited_active_is_rotated() {
        let mut current = active("cur", "current@x", &[("gemini", 90.0)]);
        current.status = AccountStatus::RateLimited;
        let h = harness(
            vec![current, account_with_quota("alt", "alt@x", &[("gemini", 50.0)])],
            true,
        );
        assert!(h.auto.check_and_switch_if_needed().await.unwrap());
        assert!(h.store.account("alt").is_active);
    }

    #[tokio::test]
    async fn test_healthy_active_or_no_active_is_noop() {
        let h = harness(vec![active("cur", "c@x", &[("gemini", 50.0)])], true);
        assert!(!h.auto.check_and_switch_if_needed().await.unwrap());

        let h = harness(vec![account_with_quota("a", "a@x", &[("gemini", 1.0)])], true);
        assert!(!h.auto.check_and_switch_if_needed().await.unwrap());
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_switch_failure_is_notified_and_returned() {
        let h = harness(
            vec![
                active("cur", "current@x", &[("gemini", 2.0)]),
                account_with_quota("alt", "alt@x", &[("gemini", 80.0)]),
            ],
            true,
        );
        h.process.fail_start(ProcessError::LaunchFailed { message: "no handler".into() });

        assert!(h.auto.check_and_switch_if_needed().await.is_err());
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::SwitchFailed);
        assert!(sent[0].body.contains("no handler"));
    }
}
