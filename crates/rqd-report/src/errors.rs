use rqd_core::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to connect to coordinator: {0}")]
    GrpcTransport(#[from] tonic::transport::Error),

    #[error("grpc call failed: {0}")]
    GrpcStatus(#[source] Box<tonic::Status>),

    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("coordinator answered {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("coordinator rejected request: {0}")]
    Rejected(String),
}

impl From<tonic::Status> for ReportError {
    fn from(status: tonic::Status) -> Self {
        ReportError::GrpcStatus(Box::new(status))
    }
}

impl From<ReportError> for ChannelError {
    fn from(err: ReportError) -> Self {
        use tonic::Code;

        match err {
            ReportError::Rejected(msg) => ChannelError::Rejected(msg),
            ReportError::GrpcStatus(status)
                if matches!(
                    status.code(),
                    Code::InvalidArgument
                        | Code::FailedPrecondition
                        | Code::PermissionDenied
                        | Code::Unauthenticated
                ) =>
            {
                ChannelError::Rejected(status.message().to_string())
            }
            ReportError::HttpStatus { status, body } if (400..500).contains(&status) => {
                ChannelError::Rejected(format!("{status}: {body}"))
            }
            other => ChannelError::Transport(other.to_string()),
        }
    }
}
