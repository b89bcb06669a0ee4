use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTransport {
    #[default]
    Grpc,
    Http,
}

impl FromStr for ReportTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grpc" => Ok(ReportTransport::Grpc),
            "http" => Ok(ReportTransport::Http),
            other => Err(format!("invalid transport: '{other}' (valid: grpc, http)")),
        }
    }
}

impl fmt::Display for ReportTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportTransport::Grpc => "grpc",
            ReportTransport::Http => "http",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Identity announced on registration and attached to every event.
    pub agent_id: String,
    pub transport: ReportTransport,
    /// Free-form labels forwarded to the coordinator (pool, site, ...).
    pub metadata: HashMap<String, String>,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl ReportConfig {
    pub fn new(agent_id: impl Into<String>, transport: ReportTransport) -> Self {
        Self {
            agent_id: agent_id.into(),
            transport,
            metadata: HashMap::new(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_parsing() {
        assert_eq!("gRPC".parse::<ReportTransport>(), Ok(ReportTransport::Grpc));
        assert_eq!(" http ".parse::<ReportTransport>(), Ok(ReportTransport::Http));
        assert!("carrier-pigeon".parse::<ReportTransport>().is_err());
        assert_eq!(ReportTransport::Http.to_string(), "http");
    }

    #[test]
    fn transport_serde_is_lowercase() {
        let json = serde_json::to_string(&ReportTransport::Grpc).unwrap();
        assert_eq!(json, "\"grpc\"");
        let back: ReportTransport = serde_json::from_str("\"http\"").unwrap();
        assert_eq!(back, ReportTransport::Http);
    }
}
