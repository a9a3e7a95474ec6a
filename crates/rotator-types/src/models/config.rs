//! Rotator configuration.
//!
//! Every field carries a serde default so a partial or older `rotator_config.json`
//! still loads.

use serde::{Deserialize, Serialize};

/// Full rotator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RotatorConfig {
    /// Notification gateway and quota thresholds
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Quota poller scheduling
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Switch orchestration timeouts
    #[serde(default)]
    pub switch: SwitchConfig,
    /// The externally controlled application
    #[serde(default)]
    pub target: TargetAppConfig,
    /// Master key storage names
    #[serde(default)]
    pub vault: VaultConfig,
}

/// Notification and threshold settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// Deliver notifications at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Average quota (percent) below which a warning is raised
    #[serde(default = "default_warning_threshold")]
    pub quota_warning_threshold: f64,
    /// Quota (percent) below which a model counts as depleted
    #[serde(default = "default_switch_threshold")]
    pub quota_switch_threshold: f64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quota_warning_threshold: default_warning_threshold(),
            quota_switch_threshold: default_switch_threshold(),
        }
    }
}

impl NotificationConfig {
    /// Warning threshold clamped into `[0, 100]`.
    pub fn warning_threshold(&self) -> f64 {
        clamp_percent(self.quota_warning_threshold)
    }

    /// Switch threshold clamped into `[0, 100]`.
    pub fn switch_threshold(&self) -> f64 {
        clamp_percent(self.quota_switch_threshold)
    }
}

/// Poller scheduling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Seconds between scheduled polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minimum seconds between focus-triggered polls
    #[serde(default = "default_focus_debounce")]
    pub focus_debounce_secs: u64,
    /// Pause before each remote quota call
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            focus_debounce_secs: default_focus_debounce(),
            request_delay_ms: default_request_delay(),
        }
    }
}

/// Timeouts used around a rotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchConfig {
    /// How long to wait for the target to exit after `close()`
    #[serde(default = "default_exit_timeout")]
    pub exit_timeout_secs: u64,
    /// Timeout for the platform quit command
    #[serde(default = "default_graceful_timeout")]
    pub graceful_quit_timeout_ms: u64,
    /// Grace delay after asking the application to quit
    #[serde(default = "default_graceful_grace")]
    pub graceful_grace_ms: u64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            exit_timeout_secs: default_exit_timeout(),
            graceful_quit_timeout_ms: default_graceful_timeout(),
            graceful_grace_ms: default_graceful_grace(),
        }
    }
}

/// Identification and launch details of the controlled application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetAppConfig {
    /// Human readable name used by the macOS quit script
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Exact process name on Linux (and fallback elsewhere)
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// App bundle fragment matched on macOS
    #[serde(default = "default_mac_bundle")]
    pub mac_bundle: String,
    /// Executable file name matched on Windows
    #[serde(default = "default_windows_exe")]
    pub windows_exe: String,
    /// URI handler used to relaunch the application
    #[serde(default = "default_launch_uri")]
    pub launch_uri: String,
    /// Explicit executable path for the direct-launch fallback
    #[serde(default)]
    pub executable_path: Option<String>,
    /// Explicit path of the application's `state.vscdb`
    #[serde(default)]
    pub state_db_path: Option<String>,
}

impl Default for TargetAppConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            process_name: default_process_name(),
            mac_bundle: default_mac_bundle(),
            windows_exe: default_windows_exe(),
            launch_uri: default_launch_uri(),
            executable_path: None,
            state_db_path: None,
        }
    }
}

/// Names under which the master key is stored in the system keychain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultConfig {
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    #[serde(default = "default_keychain_account")]
    pub keychain_account: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            keychain_service: default_keychain_service(),
            keychain_account: default_keychain_account(),
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

const fn default_true() -> bool {
    true
}
const fn default_warning_threshold() -> f64 {
    20.0
}
const fn default_switch_threshold() -> f64 {
    5.0
}
const fn default_poll_interval() -> u64 {
    300
}
const fn default_focus_debounce() -> u64 {
    10
}
const fn default_request_delay() -> u64 {
    500
}
const fn default_exit_timeout() -> u64 {
    10
}
const fn default_graceful_timeout() -> u64 {
    3000
}
const fn default_graceful_grace() -> u64 {
    2000
}
fn default_display_name() -> String {
    "Antigravity".to_string()
}
fn default_process_name() -> String {
    "antigravity".to_string()
}
fn default_mac_bundle() -> String {
    "antigravity.app".to_string()
}
fn default_windows_exe() -> String {
    "antigravity.exe".to_string()
}
fn default_launch_uri() -> String {
    "antigravity://oauth-success".to_string()
}
fn default_keychain_service() -> String {
    "AntigravityManager".to_string()
}
fn default_keychain_account() -> String {
    "MasterKey".to_string()
}
