//! Task outcomes and slot status.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// How an armed task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The countdown elapsed before any cancellation.
    Fired,
    /// The task was cancelled or superseded by a newer one.
    Cancelled,
}

impl TaskOutcome {
    /// Build an outcome from the flag passed to task callbacks.
    #[must_use]
    pub const fn from_cancelled(was_cancelled: bool) -> Self {
        if was_cancelled {
            Self::Cancelled
        } else {
            Self::Fired
        }
    }

    /// The flag passed to task callbacks.
    #[must_use]
    pub const fn was_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the task fired naturally.
    #[must_use]
    pub const fn is_fired(self) -> bool {
        matches!(self, Self::Fired)
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fired => write!(f, "fired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Observable state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// No task is armed.
    Idle,
    /// A task is armed and will fire at `due_at` unless cancelled or extended.
    Armed {
        /// When the armed task is due.
        due_at: Instant,
    },
}

impl SlotStatus {
    /// Check if the slot is idle.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if a task is armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }
}
