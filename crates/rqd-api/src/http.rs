use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rqd_model::{
    CancelOutcome, RejectReason, SubmitOutcome, TaskAssignment, TaskId, TaskInfo, TaskQuery,
    TaskState,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/v1/tasks - Offer an assignment
    /// - GET /api/v1/tasks - List tasks (`job`, `state`, `limit`, `offset`)
    /// - GET /api/v1/tasks/{id} - Task snapshot
    /// - POST /api/v1/tasks/{id}/kill - Cancel a task
    /// - GET /api/v1/host - Host report
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/tasks", post(launch_task::<H>).get(list_tasks::<H>))
            .route("/api/v1/tasks/{id}", get(get_task::<H>))
            .route("/api/v1/tasks/{id}/kill", post(kill_task::<H>))
            .route("/api/v1/host", get(host_report::<H>))
            .with_state(self.handler)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LaunchTaskRequest {
    assignment: TaskAssignment,
}

#[derive(Debug, Deserialize)]
struct ListTasksParams {
    job: Option<String>,
    state: Option<String>,
    /// Max items per page (default 100, max 1000)
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListTasksResponse {
    tasks: Vec<TaskInfo>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct KillTaskResponse {
    result: CancelOutcome,
}

/// HTTP status for an admission answer: 202 once accepted, 400 for a
/// malformed assignment, 409 when the host cannot take it right now.
fn submit_status(outcome: &SubmitOutcome) -> StatusCode {
    match outcome {
        SubmitOutcome::Accepted => StatusCode::ACCEPTED,
        SubmitOutcome::Rejected {
            reason: RejectReason::Invalid(_),
        } => StatusCode::BAD_REQUEST,
        SubmitOutcome::Rejected {
            reason: RejectReason::ShuttingDown,
        } => StatusCode::SERVICE_UNAVAILABLE,
        SubmitOutcome::Rejected { .. } => StatusCode::CONFLICT,
    }
}

/// POST /api/v1/tasks
async fn launch_task<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<LaunchTaskRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    debug!(task_id = %req.assignment.task_id, job_id = %req.assignment.job_id, "launch requested");
    let outcome = handler.launch_task(req.assignment).await?;
    Ok((submit_status(&outcome), Json(outcome)))
}

/// GET /api/v1/tasks
async fn list_tasks<H>(
    State(handler): State<Arc<H>>,
    Query(params): Query<ListTasksParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let mut query = TaskQuery::new();
    if let Some(job) = params.job {
        query = query.with_job(job);
    }
    if let Some(state) = params.state {
        let state: TaskState = state.parse().map_err(ApiError::InvalidRequest)?;
        query = query.with_state(state);
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let page = handler.list_tasks(query).await?;
    Ok(Json(ListTasksResponse {
        tasks: page.items,
        total: page.total,
    }))
}

/// GET /api/v1/tasks/{id}
async fn get_task<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task_id = TaskId::from(id);
    match handler.get_task(&task_id).await? {
        Some(info) => Ok(Json(info)),
        None => Err(ApiError::TaskNotFound(task_id.to_string())),
    }
}

/// POST /api/v1/tasks/{id}/kill
async fn kill_task<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let task_id = TaskId::from(id);
    debug!(%task_id, "kill requested");
    match handler.kill_task(&task_id).await? {
        CancelOutcome::NotFound => Err(ApiError::TaskNotFound(task_id.to_string())),
        result => Ok(Json(KillTaskResponse { result })),
    }
}

/// GET /api/v1/host
async fn host_report<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.host_report().await?))
}
