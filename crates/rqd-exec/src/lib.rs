//! Subprocess execution for render tasks.
//!
//! [`ProcessLauncher`] implements the core [`Launcher`](rqd_core::Launcher)
//! seam on top of `tokio::process`: each task runs in its own process group,
//! its stdout/stderr are forwarded line by line to an
//! [`OutputSink`](rqd_core::OutputSink), and no child outlives its handle.
mod error;
pub use error::{ExecError, ExecResult};

pub mod limits;
pub use limits::RlimitConfig;

pub mod output;
pub use output::{FanOut, FileOutput, TracingOutput};

mod process;
pub use process::TaskProcess;

mod launcher;
pub use launcher::ProcessLauncher;

mod signal;

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{FanOut, FileOutput, ProcessLauncher, RlimitConfig, TaskProcess, TracingOutput};
}
