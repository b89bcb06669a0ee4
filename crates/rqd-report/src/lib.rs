//! Outbound coordinator client.
//!
//! Implements the core's [`Connector`](rqd_core::Connector) seam twice: over
//! gRPC ([`GrpcConnector`]) and over JSON/HTTP ([`HttpConnector`]). Both speak
//! the same three calls: register, periodic status report, task event.
pub mod proto {
    tonic::include_proto!("rqd.report.v1");
}

mod config;
pub use config::{ReportConfig, ReportTransport};

mod errors;
pub use errors::ReportError;

mod grpc;
pub use grpc::{GrpcChannel, GrpcConnector};

mod http;
pub use http::{HttpChannel, HttpConnector};

pub mod wire;

use std::sync::Arc;

use rqd_core::Connector;

/// Build the connector matching `config.transport`.
pub fn connector(config: ReportConfig) -> Result<Arc<dyn Connector>, ReportError> {
    Ok(match config.transport {
        ReportTransport::Grpc => Arc::new(GrpcConnector::new(config)),
        ReportTransport::Http => Arc::new(HttpConnector::new(config)?),
    })
}
