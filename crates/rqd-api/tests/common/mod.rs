#![allow(dead_code)]

use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use rqd_api::{ApiError, ApiHandler};
use rqd_model::{
    CancelOutcome, HostReport, HostResources, RejectReason, ResourceSet, SubmitOutcome,
    TaskAssignment, TaskId, TaskInfo, TaskOutcome, TaskPage, TaskQuery, TaskState,
};

/// In-memory handler: admits by cores only, never runs anything.
pub struct FakeHandler {
    state: Mutex<FakeState>,
}

struct FakeState {
    host: HostResources,
    tasks: Vec<TaskInfo>,
}

impl FakeHandler {
    pub fn new(cores: u32) -> Self {
        Self {
            state: Mutex::new(FakeState {
                host: HostResources::new(ResourceSet::new(cores, 16_384, 0)),
                tasks: Vec::new(),
            }),
        }
    }

    /// Mark a task as finished with the given outcome.
    pub fn finish(&self, id: &str, outcome: TaskOutcome) {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.tasks.iter_mut().find(|t| t.task_id.as_str() == id) {
            info.state = outcome.state();
            info.outcome = Some(outcome);
        }
    }
}

fn info_for(a: &TaskAssignment) -> TaskInfo {
    let now = SystemTime::now();
    TaskInfo {
        task_id: a.task_id.clone(),
        job_id: a.job_id.clone(),
        state: TaskState::Pending,
        outcome: None,
        frame_range: a.frame_range,
        resources: ResourceSet::new(a.cores_requested, a.memory_requested, a.gpus_requested),
        pid: None,
        created_at: now,
        started_at: None,
        last_heartbeat_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ApiHandler for FakeHandler {
    async fn launch_task(&self, assignment: TaskAssignment) -> Result<SubmitOutcome, ApiError> {
        if let Err(e) = assignment.validate() {
            return Ok(SubmitOutcome::rejected(RejectReason::Invalid(e.to_string())));
        }
        let mut state = self.state.lock().unwrap();
        if state.tasks.iter().any(|t| t.task_id == assignment.task_id) {
            return Ok(SubmitOutcome::rejected(RejectReason::DuplicateTask));
        }
        if assignment.cores_requested > state.host.available.cores {
            return Ok(SubmitOutcome::rejected(RejectReason::InsufficientCores));
        }
        state.host.available.cores -= assignment.cores_requested;
        state.tasks.push(info_for(&assignment));
        Ok(SubmitOutcome::Accepted)
    }

    async fn kill_task(&self, id: &TaskId) -> Result<CancelOutcome, ApiError> {
        let state = self.state.lock().unwrap();
        Ok(match state.tasks.iter().find(|t| &t.task_id == id) {
            None => CancelOutcome::NotFound,
            Some(t) if t.state.is_terminal() => CancelOutcome::AlreadyFinished,
            Some(_) => CancelOutcome::Cancelling,
        })
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskInfo>, ApiError> {
        let state = self.state.lock().unwrap();
        Ok(state.tasks.iter().find(|t| &t.task_id == id).cloned())
    }

    async fn list_tasks(&self, query: TaskQuery) -> Result<TaskPage<TaskInfo>, ApiError> {
        let state = self.state.lock().unwrap();
        let matching: Vec<TaskInfo> = state
            .tasks
            .iter()
            .filter(|t| query.job_id.as_ref().is_none_or(|j| &t.job_id == j))
            .filter(|t| query.state.is_none_or(|s| t.state == s))
            .cloned()
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok(TaskPage { items, total })
    }

    async fn host_report(&self) -> Result<HostReport, ApiError> {
        let state = self.state.lock().unwrap();
        Ok(HostReport {
            agent_id: "agent-test".into(),
            hostname: "render-01".into(),
            resources: state.host,
            tasks: state.tasks.clone(),
            uptime_seconds: 3,
            timestamp: SystemTime::now(),
        })
    }
}

pub fn assignment(id: &str, job: &str, cores: u32) -> TaskAssignment {
    TaskAssignment::new(id, job, vec!["render".into()], cores, 1024)
}
