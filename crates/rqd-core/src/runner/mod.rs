//! Task admission and supervision.
//!
//! Every accepted assignment gets one monitor (a tokio task) that owns the
//! [`RunningTask`](task::RunningTask) and its process handle exclusively. The
//! monitor is the only writer of that task's state; the runner and everyone
//! else read cloned [`TaskInfo`] snapshots out of the [`TaskTable`].
mod config;
pub use config::{HEARTBEAT_SAFETY_FACTOR, RunnerConfig};

pub mod frames;

mod monitor;
mod table;
pub use table::TaskTable;

mod task;

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use rqd_model::{
    CancelOutcome, HostResources, RejectReason, ResourceSet, SubmitOutcome, TaskAssignment,
    TaskId, TaskInfo, TaskPage, TaskQuery,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::{
    CoreError, DiscardOutput, EventBus, Launcher, MetricsHandle, NoopMetrics, OutputSink,
    ResourceLedger,
};

use task::RunningTask;

pub(crate) struct Shared {
    pub(crate) config: RunnerConfig,
    pub(crate) ledger: Arc<ResourceLedger>,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) output: Arc<dyn OutputSink>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) metrics: MetricsHandle,
    pub(crate) table: TaskTable,
    /// Cancellation handle of every task whose monitor is still alive.
    pub(crate) controls: Mutex<HashMap<TaskId, CancellationToken>>,
    closed: AtomicBool,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl Shared {
    pub(crate) fn forget_control(&self, id: &TaskId) {
        self.controls
            .lock()
            .expect("runner controls lock poisoned")
            .remove(id);
    }
}

/// Builder for [`TaskRunner`].
pub struct RunnerBuilder {
    config: RunnerConfig,
    ledger: Arc<ResourceLedger>,
    launcher: Arc<dyn Launcher>,
    output: Arc<dyn OutputSink>,
    events: Arc<EventBus>,
    metrics: MetricsHandle,
}

impl RunnerBuilder {
    /// Where captured task output goes. Defaults to [`DiscardOutput`].
    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    /// Bus receiving every state transition. Defaults to a silent bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Result<TaskRunner, CoreError> {
        self.config.validate()?;
        Ok(TaskRunner {
            shared: Arc::new(Shared {
                config: self.config,
                ledger: self.ledger,
                launcher: self.launcher,
                output: self.output,
                events: self.events,
                metrics: self.metrics,
                table: TaskTable::new(),
                controls: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }
}

/// Admits assignments against the [`ResourceLedger`] and supervises one
/// subprocess per accepted assignment.
///
/// Cheap to clone; all clones drive the same set of tasks.
#[derive(Clone)]
pub struct TaskRunner {
    shared: Arc<Shared>,
}

impl TaskRunner {
    pub fn builder(
        config: RunnerConfig,
        ledger: Arc<ResourceLedger>,
        launcher: Arc<dyn Launcher>,
    ) -> RunnerBuilder {
        RunnerBuilder {
            config,
            ledger,
            launcher,
            output: Arc::new(DiscardOutput),
            events: Arc::new(EventBus::silent()),
            metrics: NoopMetrics::handle(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.shared.config
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.shared.ledger
    }

    pub fn resources(&self) -> HostResources {
        self.shared.ledger.snapshot()
    }

    /// Admit `assignment` or say why not.
    ///
    /// On rejection nothing is reserved and nothing is started. On acceptance
    /// the task is recorded as `Pending` and its monitor is spawned; the
    /// caller learns about later progress through task events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, assignment: TaskAssignment) -> SubmitOutcome {
        match self.admit(assignment) {
            Ok(()) => SubmitOutcome::Accepted,
            Err((task_id, reason)) => {
                info!(target: "rqd.core.runner", %task_id, %reason, "assignment rejected");
                self.shared.metrics.admission_rejected(&reason);
                SubmitOutcome::rejected(reason)
            }
        }
    }

    fn admit(&self, assignment: TaskAssignment) -> Result<(), (TaskId, RejectReason)> {
        let shared = &self.shared;
        let task_id = assignment.task_id.clone();

        if shared.closed.load(Ordering::Acquire) {
            return Err((task_id, RejectReason::ShuttingDown));
        }
        if let Err(err) = assignment.validate() {
            return Err((task_id, RejectReason::Invalid(err.to_string())));
        }

        // Holding the controls lock across the duplicate check, the
        // reservation and the insert keeps two submits of the same id from
        // both getting through.
        let mut controls = shared
            .controls
            .lock()
            .expect("runner controls lock poisoned");
        if controls.contains_key(&task_id) || shared.table.contains(&task_id) {
            return Err((task_id, RejectReason::DuplicateTask));
        }

        let request = ResourceSet::new(
            assignment.cores_requested,
            assignment.memory_requested,
            assignment.gpus_requested,
        );
        shared
            .ledger
            .try_reserve(&task_id, request)
            .map_err(|reason| (task_id.clone(), reason))?;

        let task = RunningTask::new(assignment);
        let info = task.info();
        let cancel = shared.root.child_token();
        controls.insert(task_id.clone(), cancel.clone());
        shared.table.insert(info.clone());
        drop(controls);

        shared.events.publish(&info);
        shared.metrics.resources(&shared.ledger.snapshot());
        info!(
            target: "rqd.core.runner",
            %task_id,
            job_id = %info.job_id,
            cores = request.cores,
            memory_mb = request.memory_mb,
            gpus = request.gpu_units,
            "assignment accepted"
        );

        shared
            .tracker
            .spawn(monitor::run_task(Arc::clone(shared), task, cancel));
        Ok(())
    }

    /// Request cancellation of a task.
    ///
    /// Returns immediately; the task reaches `Failed(Cancelled)` once its
    /// monitor has killed the process.
    pub fn cancel(&self, task_id: &TaskId) -> CancelOutcome {
        let controls = self
            .shared
            .controls
            .lock()
            .expect("runner controls lock poisoned");

        match controls.get(task_id) {
            Some(token) => {
                let terminal = self
                    .shared
                    .table
                    .get(task_id)
                    .is_some_and(|info| info.state.is_terminal());
                if terminal {
                    return CancelOutcome::AlreadyFinished;
                }
                if !token.is_cancelled() {
                    debug!(target: "rqd.core.runner", %task_id, "cancel requested");
                    token.cancel();
                }
                CancelOutcome::Cancelling
            }
            None if self.shared.table.contains(task_id) => CancelOutcome::AlreadyFinished,
            None => CancelOutcome::NotFound,
        }
    }

    pub fn task(&self, task_id: &TaskId) -> Option<TaskInfo> {
        self.shared.table.get(task_id)
    }

    /// Snapshot of every known task, oldest first.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.shared.table.list_all()
    }

    pub fn query(&self, query: &TaskQuery) -> TaskPage<TaskInfo> {
        self.shared.table.query(query)
    }

    /// Number of tasks whose monitor is still running.
    pub fn active(&self) -> usize {
        self.shared
            .controls
            .lock()
            .expect("runner controls lock poisoned")
            .len()
    }

    /// Forget a terminal task once its final state has been delivered
    /// upstream. Returns `false` for unknown or still-active tasks.
    pub fn acknowledge(&self, task_id: &TaskId) -> bool {
        match self.shared.table.get(task_id) {
            Some(info) if info.state.is_terminal() => {
                self.shared.table.remove(task_id);
                debug!(target: "rqd.core.runner", %task_id, "terminal task acknowledged");
                true
            }
            _ => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stop admitting work, cancel every task and wait for all monitors to
    /// finish. Reservations are all released when this returns.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            warn!(target: "rqd.core.runner", "shutdown already in progress");
        }
        let active = self.active();
        info!(target: "rqd.core.runner", active, "shutting down task runner");

        self.shared.root.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        info!(target: "rqd.core.runner", "task runner stopped");
    }
}
