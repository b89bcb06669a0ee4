use async_trait::async_trait;
use rqd_model::{
    CancelOutcome, HostReport, SubmitOutcome, TaskAssignment, TaskId, TaskInfo, TaskPage,
    TaskQuery,
};

use crate::error::ApiError;

/// Backend of the inbound API.
///
/// Admission rejections are answers, not errors: `launch_task` returns
/// `Ok(SubmitOutcome::Rejected { .. })` and the transport decides how to
/// render it. `Err` is reserved for requests the agent could not process.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Offer an assignment to the agent.
    async fn launch_task(&self, assignment: TaskAssignment) -> Result<SubmitOutcome, ApiError>;

    /// Request cancellation of a task.
    async fn kill_task(&self, id: &TaskId) -> Result<CancelOutcome, ApiError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskInfo>, ApiError>;

    async fn list_tasks(&self, query: TaskQuery) -> Result<TaskPage<TaskInfo>, ApiError>;

    /// Current host snapshot, the same payload that is pushed upstream.
    async fn host_report(&self) -> Result<HostReport, ApiError>;
}
