//! Inbound control surface of the agent.
//!
//! The coordinator (or an operator) reaches the agent over gRPC, HTTP or both.
//! Transports are thin: they decode a request, hand it to an [`ApiHandler`]
//! and encode the answer. [`DispatcherAdapter`] is the handler used by the
//! daemon; it forwards everything to the agent core's inbox.
mod error;
pub use error::ApiError;

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::DispatcherAdapter;

/// Generated protobuf types and service stubs.
#[cfg(feature = "grpc")]
pub mod proto {
    pub mod types {
        pub mod v1 {
            tonic::include_proto!("rqd.types.v1");
        }
    }
    pub mod api {
        pub mod v1 {
            tonic::include_proto!("rqd.api.v1");
        }
    }
}

#[cfg(feature = "grpc")]
mod convert;

#[cfg(feature = "grpc")]
pub use convert::{from_unix_ms, to_unix_ms};

#[cfg(feature = "grpc")]
mod grpc;

#[cfg(feature = "grpc")]
pub use grpc::RqdAgentService;

#[cfg(feature = "grpc")]
pub use proto::api::v1::rqd_agent_server::RqdAgentServer;

#[cfg(feature = "grpc")]
pub use tonic;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
