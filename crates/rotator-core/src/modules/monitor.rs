//! Quota poller.
//!
//! A free-running timer fires a scheduled poll every `poll_interval_secs`; a focus
//! event triggers an extra poll (debounced) and restarts the timer window. Only one
//! poll runs at a time; an attempt while one is running is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rotator_types::models::{MonitorConfig, NotificationConfig};
use rotator_types::CloudAccount;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::modules::account::AccountStore;
use crate::modules::notification::NotificationGateway;
use crate::modules::quota::QuotaRefresher;
use crate::modules::rotation::policy::in_warning_band;
use crate::modules::rotation::AutoSwitcher;
use crate::modules::token::TokenCoordinator;

/// Why a poll was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    /// First poll after `init`; never switches accounts
    Startup,
    Scheduled,
    Focus,
    Manual,
}

impl PollTrigger {
    const fn checks_rotation(self) -> bool {
        !matches!(self, Self::Startup)
    }
}

/// Clears the polling flag however the poll ends.
struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Timer {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct QuotaPoller {
    store: Arc<dyn AccountStore>,
    tokens: TokenCoordinator,
    quota: QuotaRefresher,
    auto: Arc<AutoSwitcher>,
    notifier: Arc<NotificationGateway>,
    config: MonitorConfig,
    thresholds: NotificationConfig,
    polling: AtomicBool,
    last_focus: Mutex<Option<Instant>>,
    reset: Notify,
    timer: Mutex<Option<Timer>>,
}

impl QuotaPoller {
    pub fn new(
        store: Arc<dyn AccountStore>,
        tokens: TokenCoordinator,
        quota: QuotaRefresher,
        auto: Arc<AutoSwitcher>,
        notifier: Arc<NotificationGateway>,
        config: MonitorConfig,
        thresholds: NotificationConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            tokens,
            quota,
            auto,
            notifier,
            config,
            thresholds,
            polling: AtomicBool::new(false),
            last_focus: Mutex::new(None),
            reset: Notify::new(),
            timer: Mutex::new(None),
        })
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Start the scheduled-poll timer. No-op when already started.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let poller = Arc::clone(self);
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        let poller = Arc::clone(&poller);
                        tokio::spawn(async move {
                            poller.poll(PollTrigger::Scheduled).await;
                        });
                    }
                    () = poller.reset.notified() => {
                        debug!("[Monitor] Timer window restarted");
                    }
                    _ = shutdown_rx.changed() => {
                        info!("[Monitor] Poll timer stopped");
                        break;
                    }
                }
            }
        });

        info!("[Monitor] Polling every {}s", interval.as_secs());
        *timer = Some(Timer { shutdown_tx, handle });
        // A focus event right after start-up would only repeat the initial poll.
        *self.last_focus.lock() = Some(Instant::now());
    }

    /// Stop the timer. A poll already running completes on its own.
    pub fn stop(&self) {
        if let Some(timer) = self.timer.lock().take() {
            if timer.shutdown_tx.send(true).is_err() {
                timer.handle.abort();
            }
            info!("[Monitor] Stopped");
        }
    }

    /// Focus-triggered poll, at most once per `focus_debounce_secs`; restarts the
    /// timer window afterwards. Returns whether a poll ran.
    pub async fn handle_app_focus(&self) -> bool {
        if self.is_polling() {
            info!("[Monitor] Polling in progress, skipping focus poll");
            return false;
        }
        {
            let mut last = self.last_focus.lock();
            let debounce = Duration::from_secs(self.config.focus_debounce_secs);
            if last.is_some_and(|at| at.elapsed() < debounce) {
                debug!("[Monitor] Focus poll debounced");
                return false;
            }
            *last = Some(Instant::now());
        }
        let ran = self.poll(PollTrigger::Focus).await;
        self.reset.notify_one();
        ran
    }

    /// Walk every account once. Returns `false` when another poll was running.
    pub async fn poll(&self, trigger: PollTrigger) -> bool {
        if self
            .polling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[Monitor] Poll already running, skipping {:?} poll", trigger);
            return false;
        }
        let _guard = PollGuard(&self.polling);

        info!("[Monitor] Starting {:?} quota poll", trigger);
        let accounts = match self.store.get_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!("[Monitor] Failed to load accounts: {}", e);
                return true;
            },
        };

        for account in &accounts {
            if let Err(e) = self.poll_account(account).await {
                warn!("[Monitor] Failed to poll {}: {}", account.email, e);
            }
        }

        if trigger.checks_rotation() {
            if let Err(e) = self.auto.check_and_switch_if_needed().await {
                error!("[Monitor] Auto-switch check failed: {}", e);
            }
        }
        info!("[Monitor] Poll finished ({} accounts)", accounts.len());
        true
    }

    async fn poll_account(&self, account: &CloudAccount) -> AppResult<()> {
        let account = self.tokens.ensure_fresh(account).await?;
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }
        let updated = self.quota.fetch_and_store(&account).await?;

        let average = updated.average_quota();
        if updated.quota.as_ref().is_some_and(|q| !q.is_empty())
            && in_warning_band(
                average,
                self.thresholds.switch_threshold(),
                self.thresholds.warning_threshold(),
            )
        {
            info!("[Monitor] {} is low on quota ({:.1}%)", updated.email, average);
            self.notifier.quota_warning(&updated.email, average);
        }
        Ok(())
    }
}
