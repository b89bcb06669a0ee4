//! Coordinator connectivity and inbound request dispatch.
//!
//! Two loops run side by side until shutdown:
//!
//! - the inbound loop answers [`ControlRequest`]s from the [`Inbox`],
//!   whether or not a coordinator session exists;
//! - the connection loop walks `Disconnected → Connecting → Connected`,
//!   registers, sends periodic host reports and drains the [`EventOutbox`].
//!
//! Tasks are never touched by connectivity changes.
mod backoff;
pub use backoff::BackoffConfig;
use backoff::Backoff;

mod config;
pub use config::AgentConfig;

mod outbox;
pub use outbox::EventOutbox;

use std::{fmt, sync::Arc, time::SystemTime};

use rqd_model::HostReport;
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ChannelError, Connector, ControlChannel, ControlRequest, CoreError, HostIdentity, Inbox,
    TaskRunner,
};

/// Coordinator session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Connectivity::Disconnected => "disconnected",
            Connectivity::Connecting => "connecting",
            Connectivity::Connected => "connected",
        })
    }
}

pub struct AgentCore {
    config: AgentConfig,
    identity: HostIdentity,
    runner: TaskRunner,
    outbox: Arc<EventOutbox>,
    connector: Arc<dyn Connector>,
    connectivity: watch::Sender<Connectivity>,
}

impl AgentCore {
    /// `outbox` must be subscribed to the runner's event bus.
    pub fn new(
        config: AgentConfig,
        identity: HostIdentity,
        runner: TaskRunner,
        outbox: Arc<EventOutbox>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let (connectivity, _) = watch::channel(Connectivity::Disconnected);
        Ok(Self {
            config,
            identity,
            runner,
            outbox,
            connector,
            connectivity,
        })
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.connectivity.borrow()
    }

    pub fn watch_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.connectivity.subscribe()
    }

    fn set_connectivity(&self, next: Connectivity) {
        let prev = self.connectivity.send_replace(next);
        if prev != next {
            debug!(target: "rqd.core.agent", from = %prev, to = %next, "connectivity changed");
        }
    }

    /// Ledger snapshot plus every task the runner still tracks.
    pub fn host_report(&self) -> HostReport {
        HostReport {
            agent_id: self.identity.agent_id.clone(),
            hostname: self.identity.hostname.clone(),
            resources: self.runner.resources(),
            tasks: self.runner.tasks(),
            uptime_seconds: self.identity.uptime_seconds(),
            timestamp: SystemTime::now(),
        }
    }

    /// Run until `shutdown` fires, then stop every task and deliver what can
    /// still be delivered.
    pub async fn run(self: Arc<Self>, inbox: Inbox, shutdown: CancellationToken) {
        info!(
            target: "rqd.core.agent",
            agent_id = %self.identity.agent_id,
            endpoints = ?self.config.endpoints,
            connector = self.connector.name(),
            "agent starting"
        );

        let inbound = tokio::spawn(Arc::clone(&self).serve_inbound(inbox, shutdown.clone()));
        let session = self.maintain_connection(&shutdown).await;

        if let Err(err) = inbound.await {
            error!(target: "rqd.core.agent", error = %err, "inbound loop panicked");
        }
        self.runner.shutdown().await;

        if let Some(channel) = session {
            let mut delivered = false;
            let flush = self.flush(channel.as_ref(), &mut delivered);
            match time::timeout(self.config.connect_timeout, flush).await {
                Ok(Ok(())) => debug!(target: "rqd.core.agent", "final events delivered"),
                Ok(Err(err)) => warn!(target: "rqd.core.agent", error = %err, "final event flush failed"),
                Err(_) => warn!(target: "rqd.core.agent", pending = self.outbox.len(), "final event flush timed out"),
            }
        }
        self.set_connectivity(Connectivity::Disconnected);
        info!(target: "rqd.core.agent", "agent stopped");
    }

    async fn serve_inbound(self: Arc<Self>, mut inbox: Inbox, shutdown: CancellationToken) {
        loop {
            let request = tokio::select! {
                _ = shutdown.cancelled() => break,
                req = inbox.receive() => match req {
                    Some(req) => req,
                    None => break,
                },
            };
            self.handle(request);
        }
        debug!(target: "rqd.core.agent", "inbound loop stopped");
    }

    fn handle(&self, request: ControlRequest) {
        let delivered = match request {
            ControlRequest::Assign { assignment, reply } => {
                reply.send(self.runner.submit(assignment)).is_ok()
            }
            ControlRequest::Cancel { task_id, reply } => {
                reply.send(self.runner.cancel(&task_id)).is_ok()
            }
            ControlRequest::Status { reply } => reply.send(self.host_report()).is_ok(),
            ControlRequest::Task { task_id, reply } => {
                reply.send(self.runner.task(&task_id)).is_ok()
            }
            ControlRequest::Query { query, reply } => {
                reply.send(self.runner.query(&query)).is_ok()
            }
        };
        if !delivered {
            debug!(target: "rqd.core.agent", "requester went away before the reply");
        }
    }

    /// Connect, serve a session, and on failure back off and try the next
    /// endpoint. Returns the live channel if shutdown arrived mid-session.
    ///
    /// The backoff restarts from its first delay only after a session got
    /// something through; registering alone does not count.
    async fn maintain_connection(
        &self,
        shutdown: &CancellationToken,
    ) -> Option<Box<dyn ControlChannel>> {
        let endpoints = &self.config.endpoints;
        let mut backoff = Backoff::new(self.config.backoff);
        let mut next = 0usize;

        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            let endpoint = endpoints[next % endpoints.len()].as_str();
            self.set_connectivity(Connectivity::Connecting);

            let attempt = tokio::select! {
                _ = shutdown.cancelled() => return None,
                res = time::timeout(self.config.connect_timeout, self.open(endpoint)) => res,
            };
            match attempt {
                Ok(Ok(channel)) => {
                    self.set_connectivity(Connectivity::Connected);
                    info!(target: "rqd.core.agent", endpoint, "connected to coordinator");

                    let mut delivered = false;
                    let result = self.session(channel.as_ref(), shutdown, &mut delivered).await;
                    if delivered {
                        backoff.reset();
                    }
                    match result {
                        Ok(()) => return Some(channel),
                        Err(err) => {
                            warn!(target: "rqd.core.agent", endpoint, error = %err, "coordinator session lost")
                        }
                    }
                }
                Ok(Err(err)) => {
                    warn!(target: "rqd.core.agent", endpoint, error = %err, "connection attempt failed")
                }
                Err(_) => {
                    warn!(target: "rqd.core.agent", endpoint, timeout = ?self.config.connect_timeout, "connection attempt timed out")
                }
            }

            self.set_connectivity(Connectivity::Disconnected);
            next = (next + 1) % endpoints.len();
            let delay = backoff.next_delay();
            debug!(target: "rqd.core.agent", ?delay, pending = self.outbox.len(), "backing off");
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = time::sleep(delay) => {}
            }
        }
    }

    async fn open(&self, endpoint: &str) -> Result<Box<dyn ControlChannel>, ChannelError> {
        let channel = self.connector.connect(endpoint).await?;
        channel.register(&self.host_report()).await?;
        Ok(channel)
    }

    /// Serve one connected session. `Ok` means shutdown, `Err` a lost link.
    /// `delivered` is set once the coordinator accepted a report or event.
    async fn session(
        &self,
        channel: &dyn ControlChannel,
        shutdown: &CancellationToken,
        delivered: &mut bool,
    ) -> Result<(), ChannelError> {
        let interval = self.config.report_interval;
        let mut report = time::interval_at(Instant::now() + interval, interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.flush(channel, delivered).await?;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                _ = self.outbox.notified() => {}
                _ = report.tick() => match channel.send_status_report(&self.host_report()).await {
                    Ok(()) => *delivered = true,
                    Err(ChannelError::Rejected(reason)) => {
                        warn!(target: "rqd.core.agent", %reason, "coordinator rejected host report");
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// Send queued events oldest first. An event leaves the queue once the
    /// coordinator accepted or refused it; a terminal one also lets the runner
    /// forget its task. Transport failures leave it queued for the next session.
    async fn flush(
        &self,
        channel: &dyn ControlChannel,
        delivered: &mut bool,
    ) -> Result<(), ChannelError> {
        while let Some(event) = self.outbox.front() {
            match channel.send_task_event(&event).await {
                Ok(()) => *delivered = true,
                Err(ChannelError::Rejected(reason)) => {
                    warn!(
                        target: "rqd.core.agent",
                        task_id = %event.task_id,
                        seq = event.seq,
                        state = %event.state,
                        %reason,
                        "coordinator rejected task event; dropping it"
                    );
                }
                Err(err) => return Err(err),
            }
            self.outbox.pop(event.seq);
            if event.is_terminal() {
                self.runner.acknowledge(&event.task_id);
            }
        }
        Ok(())
    }
}
