use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::task_info::time_serde;
use crate::{JobId, TaskId, TaskInfo, TaskOutcome, TaskState};

/// One state transition of one task, as pushed to the coordinator.
///
/// `seq` grows monotonically per agent process; events of the same task are
/// always emitted in lifecycle order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub seq: u64,
    pub task_id: TaskId,
    pub job_id: JobId,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(with = "time_serde")]
    pub at: SystemTime,
}

impl TaskEvent {
    /// Build an event from the task snapshot taken right after a transition.
    pub fn from_info(seq: u64, info: &TaskInfo) -> Self {
        Self {
            seq,
            task_id: info.task_id.clone(),
            job_id: info.job_id.clone(),
            state: info.state,
            outcome: info.outcome.clone(),
            pid: info.pid,
            at: info.updated_at,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
