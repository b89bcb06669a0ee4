use thiserror::Error;

/// Validation errors for incoming assignments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("task id is empty")]
    EmptyTaskId,
    #[error("job id is empty")]
    EmptyJobId,
    #[error("command is empty")]
    EmptyCommand,
    #[error("cores requested must be > 0")]
    ZeroCores,
    #[error("memory requested must be > 0")]
    ZeroMemory,
    #[error("invalid frame range {start}-{end}")]
    InvalidFrameRange { start: i64, end: i64 },
    #[error("chunk size must be >= 1")]
    ZeroChunk,
}
