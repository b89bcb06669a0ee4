use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{FrameRange, JobId, MemoryMb, ModelError, TaskEnv, TaskId};

/// One unit of work sent by the coordinator: typically one frame chunk of a
/// render layer.
///
/// Immutable once accepted by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub job_id: JobId,
    /// Argument vector; the first element is the executable.
    pub command: Vec<String>,
    pub cores_requested: u32,
    pub memory_requested: MemoryMb,
    #[serde(default)]
    pub gpus_requested: u32,
    pub frame_range: FrameRange,
    #[serde(default, skip_serializing_if = "TaskEnv::is_empty")]
    pub environment: TaskEnv,
    /// Working directory. When `None` the agent's configured default is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl TaskAssignment {
    /// Minimal assignment with a single frame and empty environment.
    pub fn new(
        task_id: impl Into<TaskId>,
        job_id: impl Into<JobId>,
        command: Vec<String>,
        cores_requested: u32,
        memory_requested: MemoryMb,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            job_id: job_id.into(),
            command,
            cores_requested,
            memory_requested,
            gpus_requested: 0,
            frame_range: FrameRange::single(1),
            environment: TaskEnv::new(),
            working_dir: None,
        }
    }

    pub fn with_frame_range(mut self, range: FrameRange) -> Self {
        self.frame_range = range;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key, value);
        self
    }

    pub fn with_gpus(mut self, gpus: u32) -> Self {
        self.gpus_requested = gpus;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Check the structural invariants an assignment must satisfy before it
    /// is considered for admission.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.task_id.is_empty() {
            return Err(ModelError::EmptyTaskId);
        }
        if self.job_id.trim().is_empty() {
            return Err(ModelError::EmptyJobId);
        }
        if self.command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ModelError::EmptyCommand);
        }
        if self.cores_requested == 0 {
            return Err(ModelError::ZeroCores);
        }
        if self.memory_requested == 0 {
            return Err(ModelError::ZeroMemory);
        }
        self.frame_range.validate()
    }
}
