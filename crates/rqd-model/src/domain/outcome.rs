use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TaskState;

/// How a subprocess ended, as observed by the process layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ExitOutcome {
    Success,
    Failure { code: i32 },
    /// Terminated by a signal; `signal` is `None` on platforms without signals.
    Killed { signal: Option<i32> },
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

/// Terminal outcome of a task: a closed set, so the reporting boundary can
/// match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TaskOutcome {
    Success,
    ExitCode { code: i32 },
    Killed { signal: Option<i32> },
    Timeout,
    Cancelled,
    LaunchFailure { message: String },
}

impl TaskOutcome {
    /// The terminal state this outcome maps to.
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Success => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    /// Exit code reported upstream; mirrors the process convention where 0 is
    /// success and anything else a failure.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskOutcome::Success => Some(0),
            TaskOutcome::ExitCode { code } => Some(*code),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::ExitCode { .. } => "exit_code",
            TaskOutcome::Killed { .. } => "killed",
            TaskOutcome::Timeout => "timeout",
            TaskOutcome::Cancelled => "cancelled",
            TaskOutcome::LaunchFailure { .. } => "launch_failure",
        }
    }
}

impl From<ExitOutcome> for TaskOutcome {
    fn from(exit: ExitOutcome) -> Self {
        match exit {
            ExitOutcome::Success => TaskOutcome::Success,
            ExitOutcome::Failure { code } => TaskOutcome::ExitCode { code },
            ExitOutcome::Killed { signal } => TaskOutcome::Killed { signal },
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::ExitCode { code } => write!(f, "exit code {code}"),
            TaskOutcome::Killed { signal: Some(sig) } => write!(f, "killed by signal {sig}"),
            TaskOutcome::LaunchFailure { message } => write!(f, "launch failure: {message}"),
            other => f.write_str(other.as_label()),
        }
    }
}
