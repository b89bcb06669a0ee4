use std::time::SystemTime;

use rqd_model::{ResourceSet, TaskAssignment, TaskId, TaskInfo, TaskOutcome, TaskState};
use tokio::time::Instant;
use tracing::error;

/// The monitor's private record of one task.
///
/// Owned by exactly one monitoring context; the rest of the agent only ever
/// sees the [`TaskInfo`] snapshots it publishes.
pub(crate) struct RunningTask {
    pub(crate) assignment: TaskAssignment,
    state: TaskState,
    outcome: Option<TaskOutcome>,
    pid: Option<u32>,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    started: Option<Instant>,
    last_heartbeat_at: SystemTime,
    last_heartbeat: Instant,
    updated_at: SystemTime,
}

impl RunningTask {
    pub(crate) fn new(assignment: TaskAssignment) -> Self {
        let now = SystemTime::now();
        Self {
            assignment,
            state: TaskState::Pending,
            outcome: None,
            pid: None,
            created_at: now,
            started_at: None,
            started: None,
            last_heartbeat_at: now,
            last_heartbeat: Instant::now(),
            updated_at: now,
        }
    }

    pub(crate) fn id(&self) -> &TaskId {
        &self.assignment.task_id
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`. Out-of-order transitions are a bug in the monitor;
    /// they are logged loudly and refused so the published history stays
    /// ordered.
    pub(crate) fn transition(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            error!(
                target: "rqd.core.runner",
                task_id = %self.assignment.task_id,
                from = %self.state,
                to = %next,
                "refusing out-of-order task transition"
            );
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
            return false;
        }
        let now = SystemTime::now();
        if next == TaskState::Running {
            self.started_at = Some(now);
            self.started = Some(Instant::now());
            self.last_heartbeat_at = now;
            self.last_heartbeat = Instant::now();
        }
        self.state = next;
        self.updated_at = now;
        true
    }

    /// Enter the terminal state matching `outcome`.
    pub(crate) fn finish(&mut self, outcome: TaskOutcome) -> bool {
        let ok = self.transition(outcome.state());
        if ok {
            self.outcome = Some(outcome);
        }
        ok
    }

    pub(crate) fn set_pid(&mut self, pid: Option<u32>) {
        self.pid = pid;
    }

    pub(crate) fn heartbeat(&mut self) {
        self.last_heartbeat_at = SystemTime::now();
        self.last_heartbeat = Instant::now();
    }

    pub(crate) fn since_heartbeat(&self) -> std::time::Duration {
        self.last_heartbeat.elapsed()
    }

    /// Wall time since the process started running, zero if it never did.
    pub(crate) fn run_duration(&self) -> std::time::Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub(crate) fn info(&self) -> TaskInfo {
        TaskInfo {
            task_id: self.assignment.task_id.clone(),
            job_id: self.assignment.job_id.clone(),
            state: self.state,
            outcome: self.outcome.clone(),
            frame_range: self.assignment.frame_range,
            resources: ResourceSet::new(
                self.assignment.cores_requested,
                self.assignment.memory_requested,
                self.assignment.gpus_requested,
            ),
            pid: self.pid,
            created_at: self.created_at,
            started_at: self.started_at,
            last_heartbeat_at: self.last_heartbeat_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> RunningTask {
        RunningTask::new(TaskAssignment::new("t", "j", vec!["x".into()], 1, 1))
    }

    #[test]
    fn running_sets_start_time() {
        let mut t = task();
        assert!(t.transition(TaskState::Launching));
        assert!(t.info().started_at.is_none());
        assert!(t.transition(TaskState::Running));
        assert!(t.info().started_at.is_some());
    }

    #[test]
    fn finish_records_outcome() {
        let mut t = task();
        t.transition(TaskState::Launching);
        t.transition(TaskState::Running);
        assert!(t.finish(TaskOutcome::ExitCode { code: 37 }));
        let info = t.info();
        assert_eq!(info.state, TaskState::Failed);
        assert_eq!(info.outcome, Some(TaskOutcome::ExitCode { code: 37 }));
    }
}
