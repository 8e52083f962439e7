//! Task lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a Task.
///
/// ```text
/// PENDING -> ELIGIBLE -> RUNNING -> COMPLETED
///                           |  ^
///                           v  |
///                         RETRYING -> FAILED
/// ```
/// Any non-terminal state may move to CANCELLED; PENDING may move straight
/// to FAILED when a dependency fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Submitted, dependencies unmet.
    #[default]
    Pending,
    /// Dependencies met, waiting for a dispatch slot.
    Eligible,
    /// Bound to one candidate backend.
    Running,
    /// Last candidate failed evaluation, moving to the next one.
    Retrying,
    /// A candidate passed evaluation.
    Completed,
    /// All candidates exhausted, or a dependency failed.
    Failed,
    /// Cancelled before completing or failing.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the task is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Upper-case name as used on the wire and in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Eligible => "ELIGIBLE",
            Self::Running => "RUNNING",
            Self::Retrying => "RETRYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Retrying.is_active());
        assert!(TaskStatus::Eligible.is_active());
    }
}
