mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use common::{Recorded, grpc_coordinator, http_coordinator};
use rqd_core::{ChannelError, Connector};
use rqd_model::{
    HostReport, HostResources, ResourceSet, TaskEvent, TaskOutcome, TaskState,
};
use rqd_report::{ReportConfig, ReportTransport, connector};

fn report() -> HostReport {
    HostReport {
        agent_id: "agent-7".into(),
        hostname: "render-07".into(),
        resources: HostResources::new(ResourceSet::new(16, 65_536, 2)),
        tasks: Vec::new(),
        uptime_seconds: 12,
        timestamp: SystemTime::now(),
    }
}

fn event(seq: u64) -> TaskEvent {
    TaskEvent {
        seq,
        task_id: "frame-0101".into(),
        job_id: "shot-010".into(),
        state: TaskState::Failed,
        outcome: Some(TaskOutcome::ExitCode { code: 37 }),
        pid: Some(4242),
        at: SystemTime::now(),
    }
}

fn config(transport: ReportTransport) -> ReportConfig {
    ReportConfig::new("agent-7", transport)
        .with_metadata(HashMap::from([("pool".to_string(), "lighting".to_string())]))
        .with_request_timeout(Duration::from_secs(2))
}

async fn session_round_trip(transport: ReportTransport, endpoint: String, recorded: &Recorded) {
    let connector: Arc<dyn Connector> = connector(config(transport)).unwrap();
    assert_eq!(connector.name(), transport.to_string());

    let channel = connector.connect(&endpoint).await.unwrap();
    channel.register(&report()).await.unwrap();
    channel.send_status_report(&report()).await.unwrap();
    channel.send_task_event(&event(3)).await.unwrap();

    let agents = recorded.agents.lock().unwrap().clone();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].agent_id, "agent-7");
    assert_eq!(agents[0].hostname, "render-07");
    assert_eq!(agents[0].metadata.get("pool").map(String::as_str), Some("lighting"));
    assert!(!agents[0].platform.is_empty());

    let reports = recorded.reports.lock().unwrap().clone();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].resources.total.cores, 16);

    let events = recorded.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "agent-7");
    assert_eq!(events[0].1.seq, 3);
    assert_eq!(events[0].1.outcome, Some(TaskOutcome::ExitCode { code: 37 }));
}

#[tokio::test]
async fn grpc_session_delivers_everything() {
    let recorded = Arc::new(Recorded::default());
    let endpoint = grpc_coordinator(Arc::clone(&recorded)).await;
    session_round_trip(ReportTransport::Grpc, endpoint, &recorded).await;
}

#[tokio::test]
async fn http_session_delivers_everything() {
    let recorded = Arc::new(Recorded::default());
    let endpoint = http_coordinator(Arc::clone(&recorded)).await;
    session_round_trip(ReportTransport::Http, endpoint, &recorded).await;
}

#[tokio::test]
async fn refusal_surfaces_as_rejected() {
    for transport in [ReportTransport::Grpc, ReportTransport::Http] {
        let recorded = Arc::new(Recorded::default());
        *recorded.refuse.lock().unwrap() = Some("agent banned".into());
        let endpoint = match transport {
            ReportTransport::Grpc => grpc_coordinator(Arc::clone(&recorded)).await,
            ReportTransport::Http => http_coordinator(Arc::clone(&recorded)).await,
        };

        let channel = connector(config(transport))
            .unwrap()
            .connect(&endpoint)
            .await
            .unwrap();
        let err = channel.register(&report()).await.unwrap_err();
        assert!(
            matches!(&err, ChannelError::Rejected(m) if m == "agent banned"),
            "{transport}: {err}"
        );
    }
}

#[tokio::test]
async fn unreachable_grpc_endpoint_fails_to_connect() {
    // Bind then drop, so nothing listens on the port.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = match connector(config(ReportTransport::Grpc))
        .unwrap()
        .connect(&format!("http://127.0.0.1:{port}"))
        .await
    {
        Ok(_) => panic!("connected to a closed port"),
        Err(e) => e,
    };
    assert!(matches!(err, ChannelError::Connect { .. }));
}

#[tokio::test]
async fn unreachable_http_endpoint_fails_on_register() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let channel = connector(config(ReportTransport::Http))
        .unwrap()
        .connect(&format!("http://127.0.0.1:{port}/"))
        .await
        .unwrap();
    assert_eq!(channel.endpoint(), format!("http://127.0.0.1:{port}"));
    assert!(matches!(
        channel.register(&report()).await,
        Err(ChannelError::Transport(_))
    ));
}

#[tokio::test]
async fn malformed_endpoints_are_connect_errors() {
    for transport in [ReportTransport::Grpc, ReportTransport::Http] {
        let result = connector(config(transport))
            .unwrap()
            .connect("not a uri")
            .await;
        assert!(matches!(result, Err(ChannelError::Connect { .. })), "{transport}");
    }
}
