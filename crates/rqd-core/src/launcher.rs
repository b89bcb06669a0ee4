//! Process abstraction used by the runner.
//!
//! The runner never touches OS processes directly: a [`Launcher`] turns a
//! [`LaunchRequest`] into a [`ProcessHandle`], which the task's monitor owns
//! exclusively until the task reaches a terminal state.
use std::{fmt, io, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use rqd_model::{ExitOutcome, TaskEnv, TaskId};
use thiserror::Error;

/// Failure to start a process. Always maps to `TaskOutcome::LaunchFailure`.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid working directory: {0}")]
    InvalidWorkingDir(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
}

impl LaunchError {
    /// Classify an `io::Error` returned by `spawn`.
    pub fn from_spawn(program: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(program.to_string()),
            _ => LaunchError::Spawn(format!("{program}: {err}")),
        }
    }
}

/// Which standard stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Receives captured output, line by line.
///
/// Called from the capture tasks, never from the task's monitor, so a slow
/// sink delays log shipping but not exit detection.
pub trait OutputSink: Send + Sync + 'static {
    fn on_line(&self, task_id: &TaskId, stream: OutputStream, line: &str);

    /// The task has finished and will produce no more output.
    fn on_close(&self, _task_id: &TaskId) {}
}

/// Sink that drops everything.
pub struct DiscardOutput;

impl OutputSink for DiscardOutput {
    fn on_line(&self, _task_id: &TaskId, _stream: OutputStream, _line: &str) {}
}

/// Everything needed to start one task process.
#[derive(Clone)]
pub struct LaunchRequest {
    pub task_id: TaskId,
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the agent's own environment.
    pub env: TaskEnv,
    pub cwd: Option<PathBuf>,
    pub output: Arc<dyn OutputSink>,
}

impl fmt::Debug for LaunchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchRequest")
            .field("task_id", &self.task_id)
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

/// Starts processes.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>, LaunchError>;
}

/// Exclusive handle to one running process.
///
/// Dropping the handle must not leave the process running.
#[async_trait]
pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Wait for the process to exit. Must be cancel-safe: the monitor drops
    /// this future whenever another branch of its `select!` wins.
    async fn wait(&mut self) -> io::Result<ExitOutcome>;

    /// Ask the process to terminate, escalating to a forced kill after
    /// `grace`. A no-op returning the recorded outcome if it already exited.
    async fn kill(&mut self, grace: Duration) -> io::Result<ExitOutcome>;

    /// Liveness probe used by the heartbeat. `false` means the process exists
    /// but cannot make progress (stopped, traced).
    fn is_responsive(&self) -> bool;
}
