use std::sync::Arc;

use rqd_model::{CancelOutcome, SubmitOutcome, TaskAssignment, TaskId, TaskQuery};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::convert::state_from_i32;
use crate::error::ApiError;
use crate::handler::ApiHandler;
use crate::proto::api::v1::{self as api, rqd_agent_server::RqdAgent};
use crate::proto::types::v1 as pb;

/// gRPC service implementation.
///
/// Wraps an `ApiHandler` and implements the generated `RqdAgent` trait.
pub struct RqdAgentService<H> {
    handler: Arc<H>,
}

impl<H> RqdAgentService<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl<H> RqdAgent for RqdAgentService<H>
where
    H: ApiHandler,
{
    async fn launch_task(
        &self,
        request: Request<api::LaunchTaskRequest>,
    ) -> Result<Response<api::LaunchTaskResponse>, Status> {
        let req = request.into_inner();

        let assignment = req
            .assignment
            .ok_or_else(|| Status::invalid_argument("missing assignment"))?;
        let assignment = TaskAssignment::try_from(assignment).map_err(Status::from)?;
        debug!(task_id = %assignment.task_id, job_id = %assignment.job_id, "launch requested");

        let outcome = self
            .handler
            .launch_task(assignment)
            .await
            .map_err(Status::from)?;

        let response = match outcome {
            SubmitOutcome::Accepted => api::LaunchTaskResponse {
                accepted: true,
                reason: api::RejectReason::Unspecified as i32,
                detail: String::new(),
            },
            SubmitOutcome::Rejected { reason } => api::LaunchTaskResponse {
                accepted: false,
                reason: api::RejectReason::from(&reason) as i32,
                detail: reason.to_string(),
            },
        };
        Ok(Response::new(response))
    }

    async fn kill_task(
        &self,
        request: Request<api::KillTaskRequest>,
    ) -> Result<Response<api::KillTaskResponse>, Status> {
        let req = request.into_inner();
        if req.task_id.trim().is_empty() {
            return Err(Status::invalid_argument("task_id cannot be empty"));
        }

        let task_id = TaskId::from(req.task_id);
        let result = match self.handler.kill_task(&task_id).await.map_err(Status::from)? {
            CancelOutcome::Cancelling => api::KillResult::Cancelling,
            CancelOutcome::AlreadyFinished => api::KillResult::AlreadyFinished,
            CancelOutcome::NotFound => api::KillResult::NotFound,
        };
        Ok(Response::new(api::KillTaskResponse {
            result: result as i32,
        }))
    }

    async fn get_host_report(
        &self,
        _request: Request<api::GetHostReportRequest>,
    ) -> Result<Response<api::GetHostReportResponse>, Status> {
        let report = self.handler.host_report().await.map_err(Status::from)?;
        Ok(Response::new(api::GetHostReportResponse {
            report: Some(report.into()),
        }))
    }

    async fn get_task(
        &self,
        request: Request<api::GetTaskRequest>,
    ) -> Result<Response<api::GetTaskResponse>, Status> {
        let task_id = TaskId::from(request.into_inner().task_id);

        let info = self
            .handler
            .get_task(&task_id)
            .await
            .map_err(Status::from)?
            .ok_or_else(|| Status::from(ApiError::TaskNotFound(task_id.to_string())))?;

        Ok(Response::new(api::GetTaskResponse {
            info: Some(info.into()),
        }))
    }

    async fn list_tasks(
        &self,
        request: Request<api::ListTasksRequest>,
    ) -> Result<Response<api::ListTasksResponse>, Status> {
        let req = request.into_inner();

        let mut query = TaskQuery::new().with_offset(req.offset as usize);
        if !req.job_id.is_empty() {
            query = query.with_job(req.job_id);
        }
        if req.state != pb::TaskState::Unspecified as i32 {
            query = query.with_state(state_from_i32(req.state).map_err(Status::from)?);
        }
        if req.limit > 0 {
            query = query.with_limit(req.limit as usize);
        }

        let page = self.handler.list_tasks(query).await.map_err(Status::from)?;
        Ok(Response::new(api::ListTasksResponse {
            tasks: page.items.into_iter().map(pb::TaskInfo::from).collect(),
            total: page.total as u64,
        }))
    }
}
