use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::task_info::time_serde;
use crate::{HostResources, TaskInfo};

/// Periodic host-state report; also the registration payload.
///
/// Reports are idempotent snapshots: the coordinator may receive the same one
/// twice and deduplicates tasks by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReport {
    pub agent_id: String,
    pub hostname: String,
    pub resources: HostResources,
    pub tasks: Vec<TaskInfo>,
    pub uptime_seconds: u64,
    #[serde(with = "time_serde")]
    pub timestamp: SystemTime,
}

impl HostReport {
    pub fn task(&self, id: &str) -> Option<&TaskInfo> {
        self.tasks.iter().find(|t| t.task_id.as_str() == id)
    }
}
