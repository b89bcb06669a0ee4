//! Coordinator-facing seams.
//!
//! Outbound: a [`Connector`] produces a [`ControlChannel`] per session; the
//! agent core owns it and drops it on the first transport error.
//!
//! Inbound: transports hold a cloneable [`Dispatcher`] and turn each request
//! into a [`ControlRequest`] for the agent's [`Inbox`]. Every request carries
//! its own reply slot, so the answer goes back to the same caller.
use async_trait::async_trait;
use rqd_model::{
    CancelOutcome, HostReport, SubmitOutcome, TaskAssignment, TaskEvent, TaskId, TaskInfo,
    TaskPage, TaskQuery,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("coordinator rejected the request: {0}")]
    Rejected(String),
    #[error("channel closed")]
    Closed,
}

/// One live session with a coordinator.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Announce this agent and its resources. A session counts as connected
    /// only after this succeeds.
    async fn register(&self, report: &HostReport) -> Result<(), ChannelError>;

    async fn send_status_report(&self, report: &HostReport) -> Result<(), ChannelError>;

    /// Deliver one task transition. The coordinator must tolerate
    /// duplicates: an event whose delivery failed is sent again on the next
    /// session.
    async fn send_task_event(&self, event: &TaskEvent) -> Result<(), ChannelError>;
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ControlChannel>, ChannelError>;
}

/// Work for the agent's inbound loop.
#[derive(Debug)]
pub enum ControlRequest {
    Assign {
        assignment: TaskAssignment,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    Cancel {
        task_id: TaskId,
        reply: oneshot::Sender<CancelOutcome>,
    },
    Status {
        reply: oneshot::Sender<HostReport>,
    },
    Task {
        task_id: TaskId,
        reply: oneshot::Sender<Option<TaskInfo>>,
    },
    Query {
        query: TaskQuery,
        reply: oneshot::Sender<TaskPage<TaskInfo>>,
    },
}

/// Create a bounded inbound queue.
pub fn inbox(capacity: usize) -> (Dispatcher, Inbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Dispatcher { tx }, Inbox { rx })
}

/// Sending half handed to inbound transports.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::Sender<ControlRequest>,
}

impl Dispatcher {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlRequest,
    ) -> Result<T, ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ChannelError::Closed)?;
        rx.await.map_err(|_| ChannelError::Closed)
    }

    pub async fn receive_assignment(
        &self,
        assignment: TaskAssignment,
    ) -> Result<SubmitOutcome, ChannelError> {
        self.call(|reply| ControlRequest::Assign { assignment, reply })
            .await
    }

    pub async fn receive_cancel(&self, task_id: TaskId) -> Result<CancelOutcome, ChannelError> {
        self.call(|reply| ControlRequest::Cancel { task_id, reply })
            .await
    }

    pub async fn host_report(&self) -> Result<HostReport, ChannelError> {
        self.call(|reply| ControlRequest::Status { reply }).await
    }

    pub async fn task(&self, task_id: TaskId) -> Result<Option<TaskInfo>, ChannelError> {
        self.call(|reply| ControlRequest::Task { task_id, reply })
            .await
    }

    pub async fn query(&self, query: TaskQuery) -> Result<TaskPage<TaskInfo>, ChannelError> {
        self.call(|reply| ControlRequest::Query { query, reply })
            .await
    }
}

/// Receiving half, consumed by the agent core.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<ControlRequest>,
}

impl Inbox {
    pub async fn receive(&mut self) -> Option<ControlRequest> {
        self.rx.recv().await
    }
}
