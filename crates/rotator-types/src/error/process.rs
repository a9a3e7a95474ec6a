//! Process lifecycle errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while controlling the external application.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProcessError {
    /// The application did not exit within the allotted time
    #[error("Process did not exit within {timeout_ms}ms")]
    ExitTimeout { timeout_ms: u64 },

    /// A platform command could not be run or reported failure
    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Neither the URI handler nor the direct launch worked
    #[error("Failed to launch application: {message}")]
    LaunchFailed { message: String },
}

impl ProcessError {
    /// Timeouts are logged and the caller carries on.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ExitTimeout { .. })
    }
}
