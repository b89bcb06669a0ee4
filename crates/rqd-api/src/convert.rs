//! Mapping between domain types and their protobuf encoding.
//!
//! Domain to wire is infallible. Wire to domain checks structure only
//! (enum values in range, required messages present); semantic checks such as
//! "cores must be positive" stay with the runner's admission.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rqd_model::{
    FrameRange, HostReport, HostResources, RejectReason, ResourceSet, TaskAssignment, TaskEnv,
    TaskEvent, TaskInfo, TaskOutcome, TaskState,
};
use tracing::warn;

use crate::error::ApiError;
use crate::proto::{api::v1 as api, types::v1 as pb};

/// Unix milliseconds; times before the epoch clamp to 0.
pub fn to_unix_ms(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => {
            warn!(error = %e, "timestamp before unix epoch, defaulting to 0");
            0
        }
    }
}

pub fn from_unix_ms(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::InvalidRequest(msg.into())
}

// ---------------------------------------------------------------------------
// Resources and frames
// ---------------------------------------------------------------------------

impl From<FrameRange> for pb::FrameRange {
    fn from(r: FrameRange) -> Self {
        pb::FrameRange {
            start: r.start,
            end: r.end,
            chunk_size: r.chunk_size,
        }
    }
}

impl From<pb::FrameRange> for FrameRange {
    fn from(r: pb::FrameRange) -> Self {
        FrameRange::new(r.start, r.end, r.chunk_size)
    }
}

impl From<ResourceSet> for pb::Resources {
    fn from(r: ResourceSet) -> Self {
        pb::Resources {
            cores: r.cores,
            memory_mb: r.memory_mb,
            gpu_units: r.gpu_units,
        }
    }
}

impl From<pb::Resources> for ResourceSet {
    fn from(r: pb::Resources) -> Self {
        ResourceSet::new(r.cores, r.memory_mb, r.gpu_units)
    }
}

impl From<HostResources> for pb::HostResources {
    fn from(h: HostResources) -> Self {
        pb::HostResources {
            total: Some(h.total.into()),
            available: Some(h.available.into()),
        }
    }
}

impl TryFrom<pb::HostResources> for HostResources {
    type Error = ApiError;

    fn try_from(h: pb::HostResources) -> Result<Self, Self::Error> {
        let total: ResourceSet = h.total.ok_or_else(|| invalid("missing total"))?.into();
        let available: ResourceSet = h
            .available
            .ok_or_else(|| invalid("missing available"))?
            .into();
        if !available.fits_within(&total) {
            return Err(invalid("available resources exceed total"));
        }
        Ok(HostResources { total, available })
    }
}

// ---------------------------------------------------------------------------
// State and outcome
// ---------------------------------------------------------------------------

impl From<TaskState> for pb::TaskState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => pb::TaskState::Pending,
            TaskState::Launching => pb::TaskState::Launching,
            TaskState::Running => pb::TaskState::Running,
            TaskState::Killing => pb::TaskState::Killing,
            TaskState::Completed => pb::TaskState::Completed,
            TaskState::Failed => pb::TaskState::Failed,
        }
    }
}

impl TryFrom<pb::TaskState> for TaskState {
    type Error = ApiError;

    fn try_from(state: pb::TaskState) -> Result<Self, Self::Error> {
        Ok(match state {
            pb::TaskState::Unspecified => return Err(invalid("task state unspecified")),
            pb::TaskState::Pending => TaskState::Pending,
            pb::TaskState::Launching => TaskState::Launching,
            pb::TaskState::Running => TaskState::Running,
            pb::TaskState::Killing => TaskState::Killing,
            pb::TaskState::Completed => TaskState::Completed,
            pb::TaskState::Failed => TaskState::Failed,
        })
    }
}

/// Decode a raw enum field.
pub(crate) fn state_from_i32(raw: i32) -> Result<TaskState, ApiError> {
    pb::TaskState::try_from(raw)
        .map_err(|_| invalid(format!("unknown task state {raw}")))?
        .try_into()
}

impl From<TaskOutcome> for pb::TaskOutcome {
    fn from(outcome: TaskOutcome) -> Self {
        let mut out = pb::TaskOutcome::default();
        let kind = match outcome {
            TaskOutcome::Success => {
                out.exit_code = Some(0);
                pb::OutcomeKind::Success
            }
            TaskOutcome::ExitCode { code } => {
                out.exit_code = Some(code);
                pb::OutcomeKind::ExitCode
            }
            TaskOutcome::Killed { signal } => {
                out.signal = signal;
                pb::OutcomeKind::Killed
            }
            TaskOutcome::Timeout => pb::OutcomeKind::Timeout,
            TaskOutcome::Cancelled => pb::OutcomeKind::Cancelled,
            TaskOutcome::LaunchFailure { message } => {
                out.message = message;
                pb::OutcomeKind::LaunchFailure
            }
        };
        out.kind = kind as i32;
        out
    }
}

impl TryFrom<pb::TaskOutcome> for TaskOutcome {
    type Error = ApiError;

    fn try_from(outcome: pb::TaskOutcome) -> Result<Self, Self::Error> {
        let kind = pb::OutcomeKind::try_from(outcome.kind)
            .map_err(|_| invalid(format!("unknown outcome kind {}", outcome.kind)))?;
        Ok(match kind {
            pb::OutcomeKind::Unspecified => return Err(invalid("outcome kind unspecified")),
            pb::OutcomeKind::Success => TaskOutcome::Success,
            pb::OutcomeKind::ExitCode => TaskOutcome::ExitCode {
                code: outcome
                    .exit_code
                    .ok_or_else(|| invalid("exit code outcome without code"))?,
            },
            pb::OutcomeKind::Killed => TaskOutcome::Killed {
                signal: outcome.signal,
            },
            pb::OutcomeKind::Timeout => TaskOutcome::Timeout,
            pb::OutcomeKind::Cancelled => TaskOutcome::Cancelled,
            pb::OutcomeKind::LaunchFailure => TaskOutcome::LaunchFailure {
                message: outcome.message,
            },
        })
    }
}

impl From<&RejectReason> for api::RejectReason {
    fn from(reason: &RejectReason) -> Self {
        match reason {
            RejectReason::InsufficientCores => api::RejectReason::InsufficientCores,
            RejectReason::InsufficientMemory => api::RejectReason::InsufficientMemory,
            RejectReason::InsufficientGpus => api::RejectReason::InsufficientGpus,
            RejectReason::DuplicateTask => api::RejectReason::DuplicateTask,
            RejectReason::Invalid(_) => api::RejectReason::Invalid,
            RejectReason::ShuttingDown => api::RejectReason::ShuttingDown,
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

impl From<TaskAssignment> for pb::TaskAssignment {
    fn from(a: TaskAssignment) -> Self {
        pb::TaskAssignment {
            task_id: a.task_id.to_string(),
            job_id: a.job_id,
            command: a.command,
            cores_requested: a.cores_requested,
            memory_requested_mb: a.memory_requested,
            gpus_requested: a.gpus_requested,
            frame_range: Some(a.frame_range.into()),
            environment: a.environment.0.into_iter().collect(),
            working_dir: a
                .working_dir
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

impl TryFrom<pb::TaskAssignment> for TaskAssignment {
    type Error = ApiError;

    fn try_from(a: pb::TaskAssignment) -> Result<Self, Self::Error> {
        if a.task_id.trim().is_empty() {
            return Err(invalid("task_id cannot be empty"));
        }
        let frame_range = a
            .frame_range
            .map(FrameRange::from)
            .unwrap_or_else(|| FrameRange::single(1));

        let mut assignment = TaskAssignment::new(
            a.task_id,
            a.job_id,
            a.command,
            a.cores_requested,
            a.memory_requested_mb,
        )
        .with_frame_range(frame_range)
        .with_gpus(a.gpus_requested);
        assignment.environment = a.environment.into_iter().collect::<TaskEnv>();
        if !a.working_dir.trim().is_empty() {
            assignment = assignment.with_working_dir(a.working_dir);
        }
        Ok(assignment)
    }
}

// ---------------------------------------------------------------------------
// Snapshots and events
// ---------------------------------------------------------------------------

impl From<TaskInfo> for pb::TaskInfo {
    fn from(info: TaskInfo) -> Self {
        pb::TaskInfo {
            task_id: info.task_id.to_string(),
            job_id: info.job_id,
            state: pb::TaskState::from(info.state) as i32,
            outcome: info.outcome.map(pb::TaskOutcome::from),
            frame_range: Some(info.frame_range.into()),
            resources: Some(info.resources.into()),
            pid: info.pid,
            created_at_ms: to_unix_ms(info.created_at),
            started_at_ms: info.started_at.map(to_unix_ms),
            last_heartbeat_at_ms: to_unix_ms(info.last_heartbeat_at),
            updated_at_ms: to_unix_ms(info.updated_at),
        }
    }
}

impl TryFrom<pb::TaskInfo> for TaskInfo {
    type Error = ApiError;

    fn try_from(info: pb::TaskInfo) -> Result<Self, Self::Error> {
        Ok(TaskInfo {
            task_id: info.task_id.into(),
            job_id: info.job_id,
            state: state_from_i32(info.state)?,
            outcome: info.outcome.map(TaskOutcome::try_from).transpose()?,
            frame_range: info
                .frame_range
                .ok_or_else(|| invalid("missing frame range"))?
                .into(),
            resources: info
                .resources
                .ok_or_else(|| invalid("missing resources"))?
                .into(),
            pid: info.pid,
            created_at: from_unix_ms(info.created_at_ms),
            started_at: info.started_at_ms.map(from_unix_ms),
            last_heartbeat_at: from_unix_ms(info.last_heartbeat_at_ms),
            updated_at: from_unix_ms(info.updated_at_ms),
        })
    }
}

impl From<TaskEvent> for pb::TaskEvent {
    fn from(event: TaskEvent) -> Self {
        pb::TaskEvent {
            seq: event.seq,
            task_id: event.task_id.to_string(),
            job_id: event.job_id,
            state: pb::TaskState::from(event.state) as i32,
            outcome: event.outcome.map(pb::TaskOutcome::from),
            pid: event.pid,
            at_ms: to_unix_ms(event.at),
        }
    }
}

impl TryFrom<pb::TaskEvent> for TaskEvent {
    type Error = ApiError;

    fn try_from(event: pb::TaskEvent) -> Result<Self, Self::Error> {
        Ok(TaskEvent {
            seq: event.seq,
            task_id: event.task_id.into(),
            job_id: event.job_id,
            state: state_from_i32(event.state)?,
            outcome: event.outcome.map(TaskOutcome::try_from).transpose()?,
            pid: event.pid,
            at: from_unix_ms(event.at_ms),
        })
    }
}

impl From<HostReport> for pb::HostReport {
    fn from(report: HostReport) -> Self {
        pb::HostReport {
            agent_id: report.agent_id,
            hostname: report.hostname,
            resources: Some(report.resources.into()),
            tasks: report.tasks.into_iter().map(pb::TaskInfo::from).collect(),
            uptime_seconds: report.uptime_seconds,
            timestamp_ms: to_unix_ms(report.timestamp),
        }
    }
}

impl TryFrom<pb::HostReport> for HostReport {
    type Error = ApiError;

    fn try_from(report: pb::HostReport) -> Result<Self, Self::Error> {
        Ok(HostReport {
            agent_id: report.agent_id,
            hostname: report.hostname,
            resources: report
                .resources
                .ok_or_else(|| invalid("missing resources"))?
                .try_into()?,
            tasks: report
                .tasks
                .into_iter()
                .map(TaskInfo::try_from)
                .collect::<Result<_, _>>()?,
            uptime_seconds: report.uptime_seconds,
            timestamp: from_unix_ms(report.timestamp_ms),
        })
    }
}
