//! Scheduling core of the render queue daemon.
//!
//! - [`ResourceLedger`]: cores/memory/GPU bookkeeping, the only state shared
//!   between tasks.
//! - [`TaskRunner`]: admission, one monitor per task, heartbeat, cancellation.
//! - [`AgentCore`]: coordinator connectivity, periodic host reports, ordered
//!   event delivery and inbound request dispatch.
//!
//! Process spawning and transports live in other crates behind the
//! [`Launcher`] and [`Connector`] traits.
pub mod error;
pub use error::CoreError;

pub mod ledger;
pub use ledger::ResourceLedger;

pub mod launcher;
pub use launcher::{
    DiscardOutput, LaunchError, LaunchRequest, Launcher, OutputSink, OutputStream, ProcessHandle,
};

pub mod events;
pub use events::{EventBus, Subscribe};

pub mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

pub mod runner;
pub use runner::{RunnerBuilder, RunnerConfig, TaskRunner, TaskTable};

pub mod channel;
pub use channel::{
    ChannelError, Connector, ControlChannel, ControlRequest, Dispatcher, Inbox, inbox,
};

pub mod agent;
pub use agent::{AgentConfig, AgentCore, BackoffConfig, Connectivity, EventOutbox};

pub mod host;
pub use host::{HostIdentity, ResourceOverrides, arch, detect_resources, os_info, platform};
