//! `rqd`: render queue daemon.
//!
//! Wires the ledger, runner and agent core to the process launcher, the
//! inbound gRPC/HTTP API and the outbound coordinator connector, then runs
//! until SIGINT or SIGTERM.
mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rqd_api::axum::{
    self, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use rqd_api::{DispatcherAdapter, HttpApi, RqdAgentServer, RqdAgentService, tonic};
use rqd_core::{
    AgentCore, EventBus, EventOutbox, HostIdentity, OutputSink, ResourceLedger, Subscribe,
    TaskRunner, detect_resources, inbox,
};
use rqd_exec::{
    ProcessLauncher,
    output::{FanOut, FileOutput, TracingOutput},
};
use rqd_observe::{EventLogger, init_logger};
use rqd_prometheus::PrometheusMetrics;
use rqd_report::ReportConfig;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{cli::Cli, config::AgentdConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let lookup = |key: &str| std::env::var(key).ok();
    let path = cli.config;
    let cfg = AgentdConfig::load(path.as_deref())?.apply_env(lookup)?;
    cfg.validate()?;

    init_logger(&cfg.logger)?;
    if let Some(path) = &path {
        info!(path = %path.display(), "configuration loaded");
    }

    // Host
    let identity = HostIdentity::detect();
    let resources = detect_resources(&cfg.overrides());
    info!(
        agent_id = %identity.agent_id,
        hostname = %identity.hostname,
        cores = resources.total.cores,
        memory_mb = resources.total.memory_mb,
        gpus = resources.total.gpu_units,
        "host resources"
    );
    let ledger = Arc::new(ResourceLedger::new(resources));

    // Runner
    let metrics = PrometheusMetrics::new().context("registering metrics")?;
    let launcher = Arc::new(ProcessLauncher::new().with_limits(cfg.rlimits()));

    let mut sinks: Vec<Arc<dyn OutputSink>> = vec![Arc::new(TracingOutput)];
    if let Some(dir) = &cfg.log_dir {
        sinks.push(Arc::new(FileOutput::new(dir)?));
        info!(dir = %dir.display(), "task logs enabled");
    }

    let outbox = Arc::new(EventOutbox::new());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(EventLogger::new()), outbox.clone()];
    let runner = TaskRunner::builder(cfg.runner_config(), ledger, launcher)
        .with_output(Arc::new(FanOut::new(sinks)))
        .with_events(Arc::new(EventBus::new(subscribers)))
        .with_metrics(Arc::new(metrics.clone()))
        .build()?;

    // Agent
    let report = ReportConfig::new(identity.agent_id.clone(), cfg.transport)
        .with_metadata(cfg.metadata.clone())
        .with_request_timeout(cfg.connect_timeout());
    let connector = rqd_report::connector(report)?;
    let agent = Arc::new(AgentCore::new(
        cfg.agent_config(),
        identity,
        runner,
        outbox,
        connector,
    )?);

    let (dispatcher, inbox) = inbox(cfg.inbox_capacity);
    let handler = Arc::new(DispatcherAdapter::new(dispatcher));
    let shutdown = CancellationToken::new();

    let mut listeners = JoinSet::new();
    if let Some(addr) = cfg.grpc_listen {
        listeners.spawn(serve_grpc(addr, Arc::clone(&handler), shutdown.clone()));
    }
    if let Some(addr) = cfg.http_listen {
        listeners.spawn(serve_http(
            addr,
            Arc::clone(&handler),
            metrics,
            shutdown.clone(),
        ));
    }
    if cfg.grpc_listen.is_none() && cfg.http_listen.is_none() {
        warn!("no inbound listener configured; the agent only reports");
    }

    let agent_task = tokio::spawn(Arc::clone(&agent).run(inbox, shutdown.clone()));

    let failure = tokio::select! {
        res = shutdown_signal() => {
            res?;
            info!("shutting down");
            None
        }
        Some(res) = listeners.join_next() => {
            Some(match res {
                Ok(Ok(())) => anyhow::anyhow!("listener exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => e.into(),
            })
        }
    };

    shutdown.cancel();
    agent_task.await.context("agent loop panicked")?;
    while let Some(res) = listeners.join_next().await {
        if let Ok(Err(e)) = res {
            warn!(error = %e, "listener stopped with error");
        }
    }

    match failure {
        Some(e) => Err(e),
        None => {
            info!("stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

async fn serve_grpc(
    addr: SocketAddr,
    handler: Arc<DispatcherAdapter>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(%addr, "grpc api listening");
    tonic::transport::Server::builder()
        .add_service(RqdAgentServer::new(RqdAgentService::new(handler)))
        .serve_with_shutdown(addr, async move { shutdown.cancelled().await })
        .await
        .with_context(|| format!("grpc listener on {addr}"))?;
    Ok(())
}

async fn serve_http(
    addr: SocketAddr,
    handler: Arc<DispatcherAdapter>,
    metrics: PrometheusMetrics,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let metrics_routes = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics);
    let app = HttpApi::new(handler).router().merge(metrics_routes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding http listener on {addr}"))?;
    info!(%addr, "http api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// GET /metrics
async fn render_metrics(State(metrics): State<PrometheusMetrics>) -> Response {
    match metrics.render() {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
