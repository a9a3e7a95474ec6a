//! Account rotation: depletion policy, the switch procedure, and the auto-switch check.

mod auto;
pub mod policy;
mod switch;

use std::fmt;

use serde::Serialize;

pub use auto::AutoSwitcher;
pub use switch::SwitchOrchestrator;

/// Progress of one rotation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwitchStage {
    Idle,
    TokenCheck,
    Stopping,
    BackingUp,
    Injecting,
    Restarting,
    Done,
    Failed,
}

impl fmt::Display for SwitchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
