use rqd_core::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("agent unavailable: {0}")]
    Unavailable(#[from] ChannelError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "grpc")]
impl From<ApiError> for tonic::Status {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            ApiError::TaskNotFound(id) => tonic::Status::not_found(format!("task not found: {id}")),
            ApiError::Unavailable(e) => tonic::Status::unavailable(e.to_string()),
            ApiError::Internal(msg) => tonic::Status::internal(format!("internal error: {msg}")),
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
