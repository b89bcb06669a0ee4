//! JSON bodies of the HTTP transport.
//!
//! Routes, all `POST`, relative to the coordinator endpoint:
//!
//! - `/api/v1/agents/register` with [`RegisterBody`]
//! - `/api/v1/agents/report` with [`StatusBody`]
//! - `/api/v1/agents/events` with [`EventBody`]
//!
//! Every route answers with an [`AckBody`].
use std::collections::HashMap;

use rqd_model::{HostReport, TaskEvent};
use serde::{Deserialize, Serialize};

pub const REGISTER_PATH: &str = "/api/v1/agents/register";
pub const REPORT_PATH: &str = "/api/v1/agents/report";
pub const EVENTS_PATH: &str = "/api/v1/agents/events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub agent_id: String,
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    pub os: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBody {
    pub agent: AgentDescriptor,
    pub report: HostReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub report: HostReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub agent_id: String,
    pub event: TaskEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckBody {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl AckBody {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }
}

/// Descriptor for this host, as announced on registration.
pub fn describe(agent_id: &str, report: &HostReport, metadata: &HashMap<String, String>) -> AgentDescriptor {
    AgentDescriptor {
        agent_id: agent_id.to_string(),
        hostname: report.hostname.clone(),
        platform: rqd_core::platform().to_string(),
        arch: rqd_core::arch().to_string(),
        os: rqd_core::os_info(),
        metadata: metadata.clone(),
    }
}
