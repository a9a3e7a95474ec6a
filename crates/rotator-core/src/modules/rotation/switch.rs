//! The switch procedure: stop the target, re-provision its credential, restart it.
//!
//! Steps are not transactional. A completed step is not undone, with one exception:
//! if injection fails after a backup was taken, the backup is put back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rotator_types::{AccountError, CloudAccount};
use tracing::{error, info, warn};

use super::SwitchStage;
use crate::error::{AppError, AppResult};
use crate::modules::account::AccountStore;
use crate::modules::injection::StateInjector;
use crate::modules::process::ProcessController;
use crate::modules::token::TokenCoordinator;

pub struct SwitchOrchestrator {
    store: Arc<dyn AccountStore>,
    tokens: TokenCoordinator,
    process: Arc<dyn ProcessController>,
    injector: Arc<dyn StateInjector>,
    exit_timeout: Duration,
    stage: Mutex<SwitchStage>,
    // One rotation at a time.
    running: tokio::sync::Mutex<()>,
}

impl SwitchOrchestrator {
    pub fn new(
        store: Arc<dyn AccountStore>,
        tokens: TokenCoordinator,
        process: Arc<dyn ProcessController>,
        injector: Arc<dyn StateInjector>,
        exit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            process,
            injector,
            exit_timeout,
            stage: Mutex::new(SwitchStage::Idle),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Stage reached by the current or most recent attempt.
    pub fn stage(&self) -> SwitchStage {
        *self.stage.lock()
    }

    fn enter(&self, stage: SwitchStage) {
        *self.stage.lock() = stage;
    }

    fn fail(&self, account_id: &str, stage: SwitchStage, source: AppError) -> AppError {
        self.enter(SwitchStage::Failed);
        error!("[Switch] Switch to {} failed during {}: {}", account_id, stage, source);
        AppError::SwitchFailed {
            account_id: account_id.to_string(),
            stage,
            source: Box::new(source),
        }
    }

    /// Make `account_id` the active account and restart the target with it.
    pub async fn switch_to(&self, account_id: &str) -> AppResult<CloudAccount> {
        let _running = self.running.lock().await;
        info!("[Switch] Switching to account {}", account_id);

        self.enter(SwitchStage::TokenCheck);
        let account = match self.store.get_account(account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                let missing = AccountError::NotFound { id: account_id.to_string() }.into();
                return Err(self.fail(account_id, SwitchStage::TokenCheck, missing));
            },
            Err(e) => return Err(self.fail(account_id, SwitchStage::TokenCheck, e)),
        };
        let mut account = self
            .tokens
            .ensure_fresh(&account)
            .await
            .map_err(|e| self.fail(account_id, SwitchStage::TokenCheck, e))?;

        self.enter(SwitchStage::Stopping);
        self.process
            .close()
            .await
            .map_err(|e| self.fail(account_id, SwitchStage::Stopping, e.into()))?;
        if let Err(e) = self.process.wait_for_exit(self.exit_timeout).await {
            warn!("[Switch] {}; continuing with the switch", e);
        }

        self.enter(SwitchStage::BackingUp);
        let backup: Option<PathBuf> = match self.injector.backup().await {
            Ok(path) => path,
            Err(e) => {
                warn!("[Switch] State backup failed, continuing without one: {}", e);
                None
            },
        };

        self.enter(SwitchStage::Injecting);
        if let Err(e) = self.injector.inject(&account).await {
            self.compensate(backup.as_deref()).await;
            return Err(self.fail(account_id, SwitchStage::Injecting, e));
        }

        self.enter(SwitchStage::Restarting);
        self.activate(&mut account)
            .await
            .map_err(|e| self.fail(account_id, SwitchStage::Restarting, e))?;
        self.process
            .start(true)
            .await
            .map_err(|e| self.fail(account_id, SwitchStage::Restarting, e.into()))?;

        self.enter(SwitchStage::Done);
        info!("[Switch] Switched to {}", account.email);
        Ok(account)
    }

    async fn activate(&self, account: &mut CloudAccount) -> AppResult<()> {
        self.store.set_active(&account.id).await?;
        self.store.update_last_used(&account.id).await?;
        account.is_active = true;
        account.update_last_used();
        Ok(())
    }

    /// Put the previous state back and bring the target up again on it.
    async fn compensate(&self, backup: Option<&std::path::Path>) {
        let Some(backup) = backup else { return };
        match self.injector.restore(backup).await {
            Ok(()) => {
                if let Err(e) = self.process.start(true).await {
                    warn!("[Switch] Relaunch after restore failed: {}", e);
                }
            },
            Err(e) => warn!("[Switch] Restoring state backup failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        account_with_quota, FakeProcess, MemoryStore, RecordingInjector, ScriptedProvider,
    };
    use rotator_types::ProcessError;

    struct Harness {
        orchestrator: SwitchOrchestrator,
        store: Arc<MemoryStore>,
        process: Arc<FakeProcess>,
        injector: Arc<RecordingInjector>,
    }

    fn harness() -> Harness {
        let mut current = account_with_quota("a1", "a@x", &[("gemini", 2.0)]);
        current.is_active = true;
        let store = Arc::new(MemoryStore::with_accounts(vec![
            current,
            account_with_quota("b1", "b@x", &[("gemini", 80.0)]),
        ]));
        let provider = Arc::new(ScriptedProvider::default());
        let process = Arc::new(FakeProcess::running());
        let injector = Arc::new(RecordingInjector::with_backup());
        let orchestrator = SwitchOrchestrator::new(
            store.clone(),
            TokenCoordinator::new(store.clone(), provider),
            process.clone(),
            injector.clone(),
            Duration::from_millis(50),
        );
        Harness { orchestrator, store, process, injector }
    }

    #[tokio::test]
    async fn test_switch_runs_every_stage_in_order() {
        let h = harness();
        let switched = h.orchestrator.switch_to("b1").await.unwrap();

        assert!(switched.is_active);
        assert_eq!(h.orchestrator.stage(), SwitchStage::Done);
        assert_eq!(h.process.calls(), vec!["close", "wait", "start"]);
        assert_eq!(h.injector.injected(), vec!["b1".to_string()]);
        assert!(h.store.account("b1").is_active);
        assert!(!h.store.account("a1").is_active);
    }

    #[tokio::test]
    async fn test_exit_timeout_is_not_fatal() {
        let h = harness();
        h.process.stay_running();
        h.orchestrator.switch_to("b1").await.unwrap();
        assert_eq!(h.orchestrator.stage(), SwitchStage::Done);
    }

    #[tokio::test]
    async fn test_injection_failure_restores_backup_and_keeps_old_active() {
        let h = harness();
        h.injector.fail_inject("database is locked");

        let err = h.orchestrator.switch_to("b1").await.unwrap_err();
        match err {
            AppError::SwitchFailed { account_id, stage, .. } => {
                assert_eq!(account_id, "b1");
                assert_eq!(stage, SwitchStage::Injecting);
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.orchestrator.stage(), SwitchStage::Failed);
        assert_eq!(h.injector.restored(), 1);
        assert_eq!(h.process.calls(), vec!["close", "wait", "start"]);
        assert!(h.store.account("a1").is_active);
        assert!(!h.store.account("b1").is_active);
    }

    #[tokio::test]
    async fn test_start_failure_is_not_rolled_back() {
        let h = harness();
        h.process.fail_start(ProcessError::LaunchFailed { message: "no handler".into() });

        let err = h.orchestrator.switch_to("b1").await.unwrap_err();
        assert!(matches!(err, AppError::SwitchFailed { stage: SwitchStage::Restarting, .. }));
        // Credential and active flag already moved to the new account.
        assert_eq!(h.injector.injected(), vec!["b1".to_string()]);
        assert!(h.store.account("b1").is_active);
    }

    #[tokio::test]
    async fn test_unknown_account_fails_at_token_check() {
        let h = harness();
        let err = h.orchestrator.switch_to("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::SwitchFailed { stage: SwitchStage::TokenCheck, .. }));
        assert!(h.process.calls().is_empty());
    }
}
