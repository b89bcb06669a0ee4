use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task on this agent.
///
/// Ordinary progress is `Pending → Launching → Running → Completed|Failed`.
/// `Killing` is entered only on an explicit cancel or a heartbeat timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Pending,
    Launching,
    Running,
    Killing,
    Completed,
    Failed,
}

impl TaskState {
    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Returns `true` if the task still holds its reservation.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Launching => 1,
            TaskState::Running => 2,
            TaskState::Killing => 3,
            TaskState::Completed | TaskState::Failed => 4,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle ordering.
    ///
    /// `Killing` may be entered from any non-terminal state; terminal states
    /// accept nothing.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TaskState::Killing => *self != TaskState::Killing,
            TaskState::Completed => *self == TaskState::Running,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Launching => "launching",
            TaskState::Running => "running",
            TaskState::Killing => "killing",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskState::Pending),
            "launching" => Ok(TaskState::Launching),
            "running" => Ok(TaskState::Running),
            "killing" => Ok(TaskState::Killing),
            "completed" => Ok(TaskState::Completed),
            "failed" => Ok(TaskState::Failed),
            other => Err(format!(
                "invalid state: '{other}' (valid: pending, launching, running, killing, completed, failed)"
            )),
        }
    }
}
