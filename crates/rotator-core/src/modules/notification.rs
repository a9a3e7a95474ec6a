//! Debounced user-facing notifications.
//!
//! Rendering is an external concern; the gateway hands finished [`Notification`]s to a
//! [`NotificationSink`]. The default sink writes them to the log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

/// Identical notifications are suppressed within this window.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AutoSwitchSuccess,
    SwitchFailed,
    QuotaWarning,
    AllDepleted,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoSwitchSuccess => "auto_switch_success",
            Self::SwitchFailed => "switch_failed",
            Self::QuotaWarning => "quota_warning",
            Self::AllDepleted => "all_depleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Should interrupt the user (failures, total depletion)
    pub critical: bool,
}

/// Delivers a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), String>;
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &Notification) -> Result<(), String> {
        if notification.critical {
            warn!("[Notify] {}: {}", notification.title, notification.body);
        } else {
            info!("[Notify] {}: {}", notification.title, notification.body);
        }
        Ok(())
    }
}

pub struct NotificationGateway {
    enabled: bool,
    window: Duration,
    sink: Arc<dyn NotificationSink>,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl NotificationGateway {
    pub fn new(enabled: bool, sink: Arc<dyn NotificationSink>) -> Self {
        Self { enabled, window: DEBOUNCE_WINDOW, sink, last_sent: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records the send time when the key is not debounced.
    fn should_send(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut last_sent = self.last_sent.lock();
        if let Some(at) = last_sent.get(key) {
            if now.duration_since(*at) < self.window {
                info!("[Notify] Debounced notification for key: {}", key);
                return false;
            }
        }
        last_sent.insert(key.to_string(), now);
        true
    }

    /// Returns whether the notification was handed to the sink.
    fn send(&self, key: String, notification: Notification) -> bool {
        if !self.enabled {
            info!("[Notify] Notifications disabled, skipping {}", notification.kind.as_str());
            return false;
        }
        if !self.should_send(&key) {
            return false;
        }
        match self.sink.deliver(&notification) {
            Ok(()) => true,
            Err(e) => {
                error!("[Notify] Failed to deliver {} notification: {}", notification.kind.as_str(), e);
                false
            },
        }
    }

    pub fn auto_switch_success(&self, from_email: &str, to_email: &str) -> bool {
        let kind = NotificationKind::AutoSwitchSuccess;
        self.send(
            format!("{}_{from_email}_{to_email}", kind.as_str()),
            Notification {
                kind,
                title: "Account Switched".to_string(),
                body: format!("Switched from {from_email} to {to_email}"),
                critical: false,
            },
        )
    }

    pub fn quota_warning(&self, email: &str, percentage: f64) -> bool {
        let kind = NotificationKind::QuotaWarning;
        self.send(
            format!("{}_{email}", kind.as_str()),
            Notification {
                kind,
                title: "Low Quota Warning".to_string(),
                body: format!("{email} has {percentage:.1}% quota remaining"),
                critical: false,
            },
        )
    }

    pub fn all_depleted(&self) -> bool {
        let kind = NotificationKind::AllDepleted;
        self.send(
            kind.as_str().to_string(),
            Notification {
                kind,
                title: "All Accounts Depleted".to_string(),
                body: "No healthy accounts available. Please add more accounts.".to_string(),
                critical: true,
            },
        )
    }

    pub fn switch_failed(&self, from_email: &str, to_email: &str, reason: &str) -> bool {
        let kind = NotificationKind::SwitchFailed;
        self.send(
            kind.as_str().to_string(),
            Notification {
                kind,
                title: "Account Switch Failed".to_string(),
                body: format!("Failed to switch from {from_email} to {to_email}: {reason}"),
                critical: true,
            },
        )
    }

    pub fn clear_debounce_cache(&self) {
        self.last_sent.lock().clear();
        info!("[Notify] Cleared debounce cache");
    }
}
