use std::sync::Arc;

use async_trait::async_trait;
use rqd_api::proto::types::v1 as pb;
use rqd_core::{ChannelError, Connector, ControlChannel};
use rqd_model::{HostReport, TaskEvent};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, trace};

use crate::config::ReportConfig;
use crate::errors::ReportError;
use crate::proto::{
    Ack, AgentInfo, RegisterRequest, ReportStatusRequest, ReportTaskEventRequest,
    coordinator_report_client::CoordinatorReportClient,
};
use crate::wire;

/// Opens gRPC sessions to `http://host:port` style endpoints.
pub struct GrpcConnector {
    config: Arc<ReportConfig>,
}

impl GrpcConnector {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    fn name(&self) -> &'static str {
        "grpc"
    }

    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ControlChannel>, ChannelError> {
        let connect_err = |reason: String| ChannelError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };

        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| connect_err(e.to_string()))?
            .timeout(self.config.request_timeout)
            .connect()
            .await
            .map_err(|e| connect_err(ReportError::from(e).to_string()))?;

        debug!(target: "rqd.report.grpc", endpoint, "channel established");
        Ok(Box::new(GrpcChannel {
            endpoint: endpoint.to_string(),
            client: CoordinatorReportClient::new(channel),
            config: Arc::clone(&self.config),
        }))
    }
}

pub struct GrpcChannel {
    endpoint: String,
    client: CoordinatorReportClient<Channel>,
    config: Arc<ReportConfig>,
}

fn check(ack: Ack) -> Result<(), ReportError> {
    if !ack.success {
        return Err(ReportError::Rejected(ack.message));
    }
    Ok(())
}

impl GrpcChannel {
    fn agent_info(&self, report: &HostReport) -> AgentInfo {
        let agent = wire::describe(&self.config.agent_id, report, &self.config.metadata);
        AgentInfo {
            agent_id: agent.agent_id,
            hostname: agent.hostname,
            platform: agent.platform,
            arch: agent.arch,
            os: agent.os,
            metadata: agent.metadata,
        }
    }
}

#[async_trait]
impl ControlChannel for GrpcChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn register(&self, report: &HostReport) -> Result<(), ChannelError> {
        let request = RegisterRequest {
            agent: Some(self.agent_info(report)),
            report: Some(pb::HostReport::from(report.clone())),
        };
        let ack = self
            .client
            .clone()
            .register(request)
            .await
            .map_err(ReportError::from)?
            .into_inner();
        Ok(check(ack)?)
    }

    async fn send_status_report(&self, report: &HostReport) -> Result<(), ChannelError> {
        trace!(target: "rqd.report.grpc", tasks = report.tasks.len(), "status report");
        let request = ReportStatusRequest {
            report: Some(pb::HostReport::from(report.clone())),
        };
        let ack = self
            .client
            .clone()
            .report_status(request)
            .await
            .map_err(ReportError::from)?
            .into_inner();
        Ok(check(ack)?)
    }

    async fn send_task_event(&self, event: &TaskEvent) -> Result<(), ChannelError> {
        let request = ReportTaskEventRequest {
            agent_id: self.config.agent_id.clone(),
            event: Some(pb::TaskEvent::from(event.clone())),
        };
        let ack = self
            .client
            .clone()
            .report_task_event(request)
            .await
            .map_err(ReportError::from)?
            .into_inner();
        Ok(check(ack)?)
    }
}
