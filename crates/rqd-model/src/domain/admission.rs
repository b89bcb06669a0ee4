use std::fmt;

use serde::{Deserialize, Serialize};

/// Why an assignment was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "reason", content = "detail")]
pub enum RejectReason {
    InsufficientCores,
    InsufficientMemory,
    InsufficientGpus,
    /// A task with the same id is already known to the agent.
    DuplicateTask,
    /// The assignment failed structural validation.
    Invalid(String),
    /// The agent is shutting down and accepts no new work.
    ShuttingDown,
}

impl RejectReason {
    /// Short label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::InsufficientCores => "insufficient_cores",
            RejectReason::InsufficientMemory => "insufficient_memory",
            RejectReason::InsufficientGpus => "insufficient_gpus",
            RejectReason::DuplicateTask => "duplicate_task",
            RejectReason::Invalid(_) => "invalid",
            RejectReason::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Invalid(msg) => write!(f, "invalid: {msg}"),
            other => f.write_str(other.as_label()),
        }
    }
}

/// Answer to an assignment request, returned synchronously to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SubmitOutcome {
    Accepted,
    Rejected { reason: RejectReason },
}

impl SubmitOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        SubmitOutcome::Rejected { reason }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// Answer to a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelOutcome {
    /// Cancellation was requested; the terminal event follows asynchronously.
    Cancelling,
    /// The task already reached a terminal state.
    AlreadyFinished,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_json_shape() {
        let json = serde_json::to_string(&SubmitOutcome::rejected(
            RejectReason::InsufficientCores,
        ))
        .unwrap();
        assert_eq!(
            json,
            r#"{"outcome":"rejected","reason":{"reason":"insufficientCores"}}"#
        );
    }

    #[test]
    fn display_includes_invalid_detail() {
        let r = RejectReason::Invalid("command is empty".into());
        assert_eq!(r.to_string(), "invalid: command is empty");
        assert_eq!(RejectReason::InsufficientMemory.to_string(), "insufficient_memory");
    }
}
