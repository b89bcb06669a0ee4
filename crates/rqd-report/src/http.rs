use std::sync::Arc;

use async_trait::async_trait;
use rqd_core::{ChannelError, Connector, ControlChannel};
use rqd_model::{HostReport, TaskEvent};
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ReportConfig;
use crate::errors::ReportError;
use crate::wire::{self, AckBody, EventBody, RegisterBody, StatusBody};

/// Talks JSON over plain HTTP. Connecting only validates the endpoint; the
/// registration call is the first request on the wire.
pub struct HttpConnector {
    client: reqwest::Client,
    config: Arc<ReportConfig>,
}

impl HttpConnector {
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ControlChannel>, ChannelError> {
        let base = endpoint.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base).map_err(|e| ChannelError::Connect {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        debug!(target: "rqd.report.http", endpoint, "session opened");
        Ok(Box::new(HttpChannel {
            base,
            client: self.client.clone(),
            config: Arc::clone(&self.config),
        }))
    }
}

pub struct HttpChannel {
    base: String,
    client: reqwest::Client,
    config: Arc<ReportConfig>,
}

impl HttpChannel {
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ReportError> {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ReportError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let ack: AckBody = serde_json::from_str(&text).map_err(|e| {
            ReportError::InvalidResponse(format!("failed to parse ack: {e}, body: {text}"))
        })?;
        if !ack.success {
            return Err(ReportError::Rejected(ack.message));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for HttpChannel {
    fn endpoint(&self) -> &str {
        &self.base
    }

    async fn register(&self, report: &HostReport) -> Result<(), ChannelError> {
        let body = RegisterBody {
            agent: wire::describe(&self.config.agent_id, report, &self.config.metadata),
            report: report.clone(),
        };
        Ok(self.post(wire::REGISTER_PATH, &body).await?)
    }

    async fn send_status_report(&self, report: &HostReport) -> Result<(), ChannelError> {
        trace!(target: "rqd.report.http", tasks = report.tasks.len(), "status report");
        let body = StatusBody {
            report: report.clone(),
        };
        Ok(self.post(wire::REPORT_PATH, &body).await?)
    }

    async fn send_task_event(&self, event: &TaskEvent) -> Result<(), ChannelError> {
        let body = EventBody {
            agent_id: self.config.agent_id.clone(),
            event: event.clone(),
        };
        Ok(self.post(wire::EVENTS_PATH, &body).await?)
    }
}
