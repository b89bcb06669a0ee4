use async_trait::async_trait;
use rqd_core::Dispatcher;
use rqd_model::{
    CancelOutcome, HostReport, SubmitOutcome, TaskAssignment, TaskId, TaskInfo, TaskPage,
    TaskQuery,
};

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Handler that forwards every request to the agent core's inbox.
///
/// Requests are answered by the core in arrival order; a closed inbox (the
/// agent is gone) surfaces as [`ApiError::Unavailable`].
pub struct DispatcherAdapter {
    dispatcher: Dispatcher,
}

impl DispatcherAdapter {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl ApiHandler for DispatcherAdapter {
    async fn launch_task(&self, assignment: TaskAssignment) -> Result<SubmitOutcome, ApiError> {
        Ok(self.dispatcher.receive_assignment(assignment).await?)
    }

    async fn kill_task(&self, id: &TaskId) -> Result<CancelOutcome, ApiError> {
        Ok(self.dispatcher.receive_cancel(id.clone()).await?)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskInfo>, ApiError> {
        Ok(self.dispatcher.task(id.clone()).await?)
    }

    async fn list_tasks(&self, query: TaskQuery) -> Result<TaskPage<TaskInfo>, ApiError> {
        Ok(self.dispatcher.query(query).await?)
    }

    async fn host_report(&self) -> Result<HostReport, ApiError> {
        Ok(self.dispatcher.host_report().await?)
    }
}
