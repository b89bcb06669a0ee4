mod common;

use std::sync::Arc;

use common::{FakeHandler, assignment};
use rqd_api::RqdAgentService;
use rqd_api::proto::api::v1::{self as api, rqd_agent_server::RqdAgent};
use rqd_api::proto::types::v1 as pb;
use rqd_api::tonic::{Code, Request};
use rqd_model::{TaskOutcome, TaskState};

fn service() -> (Arc<FakeHandler>, RqdAgentService<FakeHandler>) {
    let handler = Arc::new(FakeHandler::new(8));
    (Arc::clone(&handler), RqdAgentService::new(handler))
}

async fn launch(svc: &RqdAgentService<FakeHandler>, id: &str, cores: u32) -> api::LaunchTaskResponse {
    svc.launch_task(Request::new(api::LaunchTaskRequest {
        assignment: Some(assignment(id, "job-a", cores).into()),
    }))
    .await
    .unwrap()
    .into_inner()
}

#[tokio::test]
async fn launch_reports_rejection_reason() {
    let (_, svc) = service();

    assert!(launch(&svc, "t1", 4).await.accepted);
    assert!(launch(&svc, "t2", 4).await.accepted);

    let rejected = launch(&svc, "t3", 4).await;
    assert!(!rejected.accepted);
    assert_eq!(rejected.reason, api::RejectReason::InsufficientCores as i32);

    let duplicate = launch(&svc, "t1", 1).await;
    assert_eq!(duplicate.reason, api::RejectReason::DuplicateTask as i32);
}

#[tokio::test]
async fn missing_assignment_is_invalid_argument() {
    let (_, svc) = service();
    let status = svc
        .launch_task(Request::new(api::LaunchTaskRequest { assignment: None }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn get_task_and_kill() {
    let (handler, svc) = service();
    launch(&svc, "t1", 1).await;
    launch(&svc, "t2", 1).await;
    handler.finish("t2", TaskOutcome::Success);

    let info = svc
        .get_task(Request::new(api::GetTaskRequest {
            task_id: "t2".into(),
        }))
        .await
        .unwrap()
        .into_inner()
        .info
        .unwrap();
    assert_eq!(info.state, pb::TaskState::Completed as i32);
    assert_eq!(info.outcome.unwrap().exit_code, Some(0));

    let status = svc
        .get_task(Request::new(api::GetTaskRequest {
            task_id: "missing".into(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    let kill = |id: &str| api::KillTaskRequest { task_id: id.into() };
    let r = svc.kill_task(Request::new(kill("t1"))).await.unwrap();
    assert_eq!(r.into_inner().result, api::KillResult::Cancelling as i32);
    let r = svc.kill_task(Request::new(kill("t2"))).await.unwrap();
    assert_eq!(r.into_inner().result, api::KillResult::AlreadyFinished as i32);
    let r = svc.kill_task(Request::new(kill("t9"))).await.unwrap();
    assert_eq!(r.into_inner().result, api::KillResult::NotFound as i32);
}

#[tokio::test]
async fn list_filters_by_state() {
    let (handler, svc) = service();
    launch(&svc, "t1", 1).await;
    launch(&svc, "t2", 1).await;
    handler.finish("t1", TaskOutcome::Cancelled);

    let page = svc
        .list_tasks(Request::new(api::ListTasksRequest {
            job_id: String::new(),
            state: pb::TaskState::from(TaskState::Failed) as i32,
            limit: 0,
            offset: 0,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(page.total, 1);
    assert_eq!(page.tasks[0].task_id, "t1");
}

#[tokio::test]
async fn host_report_over_grpc() {
    let (_, svc) = service();
    launch(&svc, "t1", 2).await;

    let report = svc
        .get_host_report(Request::new(api::GetHostReportRequest {}))
        .await
        .unwrap()
        .into_inner()
        .report
        .unwrap();
    let resources = report.resources.unwrap();
    assert_eq!(resources.available.unwrap().cores, 6);
    assert_eq!(report.tasks.len(), 1);
}
