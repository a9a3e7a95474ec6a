//! Lifecycle control of the externally managed application.
//!
//! Detection, graceful-then-forceful stop, and relaunch. Everything that touches the
//! OS process table runs on the blocking pool.

mod close;
mod detection;
mod patterns;
mod start;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rotator_types::models::{SwitchConfig, TargetAppConfig};
use rotator_types::ProcessError;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::paths::default_executable_path;

pub use patterns::{Platform, ProcessCandidate, TargetMatcher};

/// Interval between running checks while waiting for exit.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Controls the one external application that consumes the active credential.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// At least one main (non-helper) process of the application exists.
    async fn is_running(&self) -> bool;

    /// Graceful quit, then force-kill whatever remains.
    async fn close(&self) -> Result<(), ProcessError>;

    /// Poll until the application is gone or `timeout` elapses.
    async fn wait_for_exit(&self, timeout: Duration) -> Result<(), ProcessError>;

    /// Launch unless already running; URI handler first when `use_uri`.
    async fn start(&self, use_uri: bool) -> Result<(), ProcessError>;
}

/// [`ProcessController`] backed by the real process table.
pub struct SystemProcessController {
    platform: Platform,
    matcher: Arc<TargetMatcher>,
    target: TargetAppConfig,
    switch: SwitchConfig,
}

impl SystemProcessController {
    pub fn new(target: TargetAppConfig, switch: SwitchConfig) -> AppResult<Self> {
        let platform = Platform::current();
        let matcher = TargetMatcher::new(&target, platform)
            .map_err(|e| AppError::Config(format!("invalid process signature: {e}")))?;
        Ok(Self { platform, matcher: Arc::new(matcher), target, switch })
    }

    fn executable(&self) -> PathBuf {
        self.target
            .executable_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map_or_else(default_executable_path, PathBuf::from)
    }
}

#[async_trait]
impl ProcessController for SystemProcessController {
    async fn is_running(&self) -> bool {
        let matcher = Arc::clone(&self.matcher);
        match tokio::task::spawn_blocking(move || detection::is_target_running(&matcher)).await {
            Ok(running) => running,
            Err(e) => {
                error!("[Process] Error checking process status: {}", e);
                false
            },
        }
    }

    async fn close(&self) -> Result<(), ProcessError> {
        info!("[Process] Closing {}...", self.target.display_name);
        close::request_graceful_quit(self.platform, &self.target, &self.switch).await;

        let matcher = Arc::clone(&self.matcher);
        match tokio::task::spawn_blocking(move || close::force_kill_all(&matcher)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("[Process] Error force-closing {}: {}", self.target.display_name, e);
                let executable = self.executable();
                if let Err(fallback) = close::fallback_kill(
                    self.platform,
                    &self.target,
                    &executable.to_string_lossy(),
                )
                .await
                {
                    warn!("[Process] Fallback termination failed: {}", fallback);
                    return Err(fallback);
                }
                info!("[Process] Fallback termination command executed");
                Ok(())
            },
        }
    }

    async fn wait_for_exit(&self, timeout: Duration) -> Result<(), ProcessError> {
        let started = Instant::now();
        while started.elapsed() < timeout {
            if !self.is_running().await {
                return Ok(());
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
        Err(ProcessError::ExitTimeout { timeout_ms: timeout.as_millis() as u64 })
    }

    async fn start(&self, use_uri: bool) -> Result<(), ProcessError> {
        info!("[Process] Starting {}...", self.target.display_name);
        if self.is_running().await {
            info!("[Process] {} is already running", self.target.display_name);
            return Ok(());
        }
        start::start_target(
            self.platform,
            use_uri,
            &self.target.launch_uri,
            &self.target.display_name,
            &self.executable(),
        )
        .await
    }
}
