#![allow(dead_code)]

use std::{
    future::pending,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rqd_core::{
    ChannelError, Connector, ControlChannel, EventBus, EventOutbox, LaunchError, LaunchRequest,
    Launcher, ProcessHandle, ResourceLedger, RunnerConfig, Subscribe, TaskRunner,
};
use rqd_model::{
    ExitOutcome, HostReport, ResourceSet, TaskAssignment, TaskEvent, TaskId, TaskInfo,
};
use tokio::time::{self, Instant};

/// Launcher whose processes are scripted by the program name:
///
/// - `true`: exits 0 after `args[0]` ms (default 10)
/// - `exit`: exits with code `args[0]` after 10 ms
/// - `sleep`: runs until killed
/// - `hang`: runs until killed and never answers the liveness probe
/// - anything else: not found
#[derive(Default)]
pub struct FakeLauncher {
    pub launched: Mutex<Vec<LaunchRequest>>,
    next_pid: AtomicU32,
}

impl FakeLauncher {
    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::Relaxed);
        let arg_ms = |default: u64| {
            request
                .args
                .first()
                .and_then(|a| a.parse().ok())
                .unwrap_or(default)
        };
        let handle = match request.program.as_str() {
            "true" => FakeProcess::exiting(pid, ExitOutcome::Success, arg_ms(10)),
            "exit" => {
                let code: i32 = request.args.first().and_then(|a| a.parse().ok()).unwrap_or(1);
                let exit = if code == 0 {
                    ExitOutcome::Success
                } else {
                    ExitOutcome::Failure { code }
                };
                FakeProcess::exiting(pid, exit, 10)
            }
            "sleep" => FakeProcess::running(pid, true),
            "hang" => FakeProcess::running(pid, false),
            other => return Err(LaunchError::NotFound(other.to_string())),
        };
        self.launched.lock().unwrap().push(request);
        Ok(Box::new(handle))
    }
}

pub struct FakeProcess {
    pid: u32,
    exit: Option<(ExitOutcome, Instant)>,
    responsive: bool,
    killed: Option<ExitOutcome>,
}

impl FakeProcess {
    fn exiting(pid: u32, exit: ExitOutcome, after_ms: u64) -> Self {
        Self {
            pid,
            exit: Some((exit, Instant::now() + Duration::from_millis(after_ms))),
            responsive: true,
            killed: None,
        }
    }

    fn running(pid: u32, responsive: bool) -> Self {
        Self {
            pid,
            exit: None,
            responsive,
            killed: None,
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> io::Result<ExitOutcome> {
        if let Some(out) = self.killed {
            return Ok(out);
        }
        match self.exit {
            Some((out, at)) => {
                time::sleep_until(at).await;
                Ok(out)
            }
            None => pending().await,
        }
    }

    async fn kill(&mut self, _grace: Duration) -> io::Result<ExitOutcome> {
        let out = *self
            .killed
            .get_or_insert(ExitOutcome::Killed { signal: Some(15) });
        Ok(out)
    }

    fn is_responsive(&self) -> bool {
        self.responsive
    }
}

/// Subscriber keeping every event.
#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<TaskEvent>>);

impl Recorder {
    pub fn for_task(&self, id: &str) -> Vec<TaskEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.task_id.as_str() == id)
            .cloned()
            .collect()
    }
}

impl Subscribe for Recorder {
    fn on_event(&self, event: &TaskEvent) {
        self.0.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

pub fn fast_config() -> RunnerConfig {
    RunnerConfig {
        heartbeat_interval: Duration::from_millis(100),
        heartbeat_timeout: Duration::from_millis(300),
        kill_grace: Duration::from_millis(50),
        ..RunnerConfig::default()
    }
}

pub struct Harness {
    pub runner: TaskRunner,
    pub launcher: Arc<FakeLauncher>,
    pub recorder: Arc<Recorder>,
    pub outbox: Arc<EventOutbox>,
}

pub fn harness(capacity: ResourceSet) -> Harness {
    let launcher = Arc::new(FakeLauncher::default());
    let recorder = Arc::new(Recorder::default());
    let outbox = Arc::new(EventOutbox::new());
    let events = EventBus::new(vec![recorder.clone(), outbox.clone()]);
    let runner = TaskRunner::builder(
        fast_config(),
        Arc::new(ResourceLedger::with_capacity(capacity)),
        launcher.clone(),
    )
    .with_events(Arc::new(events))
    .build()
    .unwrap();
    Harness {
        runner,
        launcher,
        recorder,
        outbox,
    }
}

pub fn assignment(id: &str, program: &str, args: &[&str], cores: u32, mem: u64) -> TaskAssignment {
    let mut command = vec![program.to_string()];
    command.extend(args.iter().map(|a| a.to_string()));
    TaskAssignment::new(id, "job", command, cores, mem)
}

/// Poll until the task is terminal.
pub async fn wait_terminal(runner: &TaskRunner, id: &str) -> TaskInfo {
    let id = TaskId::from(id);
    time::timeout(Duration::from_secs(60), async {
        loop {
            if let Some(info) = runner.task(&id)
                && info.state.is_terminal()
            {
                return info;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    time::timeout(Duration::from_secs(60), async {
        while !cond() {
            time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

/// In-memory coordinator shared by every channel a [`FakeConnector`] opens.
#[derive(Default)]
pub struct FakeCoordinator {
    pub down: AtomicBool,
    /// Registration works but reports and events fail in transit.
    pub flaky: AtomicBool,
    /// Tasks whose events are refused as invalid.
    pub refused_tasks: Mutex<Vec<String>>,
    pub refusals: AtomicU32,
    pub registrations: Mutex<Vec<(String, HostReport)>>,
    pub reports: Mutex<Vec<HostReport>>,
    pub events: Mutex<Vec<TaskEvent>>,
}

impl FakeCoordinator {
    fn check(&self) -> Result<(), ChannelError> {
        if self.down.load(Ordering::SeqCst) {
            Err(ChannelError::Transport("coordinator down".into()))
        } else {
            Ok(())
        }
    }

    fn check_delivery(&self) -> Result<(), ChannelError> {
        self.check()?;
        if self.flaky.load(Ordering::SeqCst) {
            Err(ChannelError::Transport("connection reset".into()))
        } else {
            Ok(())
        }
    }

    pub fn refuse_events_for(&self, id: &str) {
        self.refused_tasks.lock().unwrap().push(id.to_string());
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn registrations(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub fn events_for(&self, id: &str) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.task_id.as_str() == id)
            .cloned()
            .collect()
    }
}

pub struct FakeConnector {
    pub coordinator: Arc<FakeCoordinator>,
    /// Endpoints that refuse connections.
    pub refused: Vec<String>,
    pub attempts: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(coordinator: Arc<FakeCoordinator>) -> Self {
        Self {
            coordinator,
            refused: Vec::new(),
            attempts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ControlChannel>, ChannelError> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        if self.refused.iter().any(|e| e == endpoint) || self.coordinator.down.load(Ordering::SeqCst)
        {
            return Err(ChannelError::Connect {
                endpoint: endpoint.to_string(),
                reason: "refused".into(),
            });
        }
        Ok(Box::new(FakeChannel {
            endpoint: endpoint.to_string(),
            coordinator: Arc::clone(&self.coordinator),
        }))
    }
}

struct FakeChannel {
    endpoint: String,
    coordinator: Arc<FakeCoordinator>,
}

#[async_trait]
impl ControlChannel for FakeChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn register(&self, report: &HostReport) -> Result<(), ChannelError> {
        self.coordinator.check()?;
        self.coordinator
            .registrations
            .lock()
            .unwrap()
            .push((self.endpoint.clone(), report.clone()));
        Ok(())
    }

    async fn send_status_report(&self, report: &HostReport) -> Result<(), ChannelError> {
        self.coordinator.check_delivery()?;
        self.coordinator.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn send_task_event(&self, event: &TaskEvent) -> Result<(), ChannelError> {
        self.coordinator.check_delivery()?;
        let refused = self
            .coordinator
            .refused_tasks
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == event.task_id.as_str());
        if refused {
            self.coordinator.refusals.fetch_add(1, Ordering::SeqCst);
            return Err(ChannelError::Rejected(format!("unknown task {}", event.task_id)));
        }
        self.coordinator.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
