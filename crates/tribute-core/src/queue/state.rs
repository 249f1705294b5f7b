//! Which collection a task currently sits in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task location.
///
/// State transitions:
/// - Pending -> Finished | Errored (main loop drain)
/// - Instant -> Finished | Errored (instant loop)
/// - Pending | Finished | Errored -> Deleted (operator)
/// - Finished | Deleted | Errored -> Pending | Instant (operator re-queue, id preserved)
///
/// Nothing ever moves back automatically; `Errored` is only left by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for the main loop.
    Pending,

    /// Waiting for the instant loop. Never persisted.
    Instant,

    Finished,

    /// Removed by an operator.
    Deleted,

    /// Execution failed. Never retried automatically.
    Errored,
}

impl TaskState {
    /// Is this a terminal state (no automatic transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Deleted | TaskState::Errored
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Instant => "instant",
            TaskState::Finished => "finished",
            TaskState::Deleted => "deleted",
            TaskState::Errored => "errored",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
