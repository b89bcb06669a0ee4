#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rqd_model::{HostReport, TaskEvent};
use rqd_report::proto::{
    Ack, RegisterRequest, ReportStatusRequest, ReportTaskEventRequest,
    coordinator_report_server::{CoordinatorReport, CoordinatorReportServer},
};
use rqd_report::wire::{self, AckBody, AgentDescriptor, EventBody, RegisterBody, StatusBody};
use tonic::{Request, Response, Status, transport::Server};

/// What a coordinator saw, whichever transport delivered it.
#[derive(Default)]
pub struct Recorded {
    pub agents: Mutex<Vec<AgentDescriptor>>,
    pub reports: Mutex<Vec<HostReport>>,
    pub events: Mutex<Vec<(String, TaskEvent)>>,
    /// When set, every call is answered with `success = false`.
    pub refuse: Mutex<Option<String>>,
}

impl Recorded {
    pub fn registrations(&self) -> usize {
        self.agents.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn ack(&self) -> Ack {
        match self.refuse.lock().unwrap().clone() {
            Some(message) => Ack {
                success: false,
                message,
            },
            None => Ack {
                success: true,
                message: String::new(),
            },
        }
    }
}

struct GrpcCoordinator(Arc<Recorded>);

#[tonic::async_trait]
impl CoordinatorReport for GrpcCoordinator {
    async fn register(&self, request: Request<RegisterRequest>) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let agent = req.agent.ok_or_else(|| Status::invalid_argument("missing agent"))?;
        let report: HostReport = req
            .report
            .ok_or_else(|| Status::invalid_argument("missing report"))?
            .try_into()
            .map_err(|e: rqd_api::ApiError| Status::invalid_argument(e.to_string()))?;
        self.0.agents.lock().unwrap().push(AgentDescriptor {
            agent_id: agent.agent_id,
            hostname: agent.hostname,
            platform: agent.platform,
            arch: agent.arch,
            os: agent.os,
            metadata: agent.metadata,
        });
        self.0.reports.lock().unwrap().push(report);
        Ok(Response::new(self.0.ack()))
    }

    async fn report_status(
        &self,
        request: Request<ReportStatusRequest>,
    ) -> Result<Response<Ack>, Status> {
        let report: HostReport = request
            .into_inner()
            .report
            .ok_or_else(|| Status::invalid_argument("missing report"))?
            .try_into()
            .map_err(|e: rqd_api::ApiError| Status::invalid_argument(e.to_string()))?;
        self.0.reports.lock().unwrap().push(report);
        Ok(Response::new(self.0.ack()))
    }

    async fn report_task_event(
        &self,
        request: Request<ReportTaskEventRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let event: TaskEvent = req
            .event
            .ok_or_else(|| Status::invalid_argument("missing event"))?
            .try_into()
            .map_err(|e: rqd_api::ApiError| Status::invalid_argument(e.to_string()))?;
        self.0.events.lock().unwrap().push((req.agent_id, event));
        Ok(Response::new(self.0.ack()))
    }
}

/// Start a gRPC coordinator on an ephemeral port; returns its endpoint URI.
pub async fn grpc_coordinator(recorded: Arc<Recorded>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming =
        tonic::transport::server::TcpIncoming::from_listener(listener, true, None).unwrap();
    tokio::spawn(
        Server::builder()
            .add_service(CoordinatorReportServer::new(GrpcCoordinator(recorded)))
            .serve_with_incoming(incoming),
    );
    format!("http://{addr}")
}

/// Start an HTTP coordinator on an ephemeral port; returns its base URL.
pub async fn http_coordinator(recorded: Arc<Recorded>) -> String {
    use axum::{Json, Router, extract::State, routing::post};

    async fn register(
        State(rec): State<Arc<Recorded>>,
        Json(body): Json<RegisterBody>,
    ) -> Json<AckBody> {
        rec.agents.lock().unwrap().push(body.agent);
        rec.reports.lock().unwrap().push(body.report);
        Json(http_ack(&rec))
    }

    async fn report(State(rec): State<Arc<Recorded>>, Json(body): Json<StatusBody>) -> Json<AckBody> {
        rec.reports.lock().unwrap().push(body.report);
        Json(http_ack(&rec))
    }

    async fn events(State(rec): State<Arc<Recorded>>, Json(body): Json<EventBody>) -> Json<AckBody> {
        rec.events.lock().unwrap().push((body.agent_id, body.event));
        Json(http_ack(&rec))
    }

    fn http_ack(rec: &Recorded) -> AckBody {
        let ack = rec.ack();
        AckBody {
            success: ack.success,
            message: ack.message,
        }
    }

    let router = Router::new()
        .route(wire::REGISTER_PATH, post(register))
        .route(wire::REPORT_PATH, post(report))
        .route(wire::EVENTS_PATH, post(events))
        .with_state(recorded);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
