use rqd_model::{TaskEvent, TaskOutcome, TaskState};
use tracing::{debug, error, info, warn};

#[inline]
pub fn message_for(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "task admitted; resources reserved",
        TaskState::Launching => "task process launching",
        TaskState::Running => "task process running",
        TaskState::Killing => "task process being killed",
        TaskState::Completed => "task completed",
        TaskState::Failed => "task failed",
    }
}

/// Log one transition at a level matching its severity.
pub fn log_event(e: &TaskEvent) {
    let msg = message_for(e.state);
    let task = e.task_id.as_str();
    let job = e.job_id.as_str();

    match (e.state, &e.outcome) {
        (TaskState::Pending | TaskState::Launching, _) => {
            debug!(target: "rqd.events", seq = e.seq, task, job, "{msg}")
        }
        (TaskState::Running, _) => {
            info!(target: "rqd.events", seq = e.seq, task, job, pid = e.pid, "{msg}")
        }
        (TaskState::Killing, _) => {
            info!(target: "rqd.events", seq = e.seq, task, job, pid = e.pid, "{msg}")
        }
        (TaskState::Completed, _) => info!(target: "rqd.events", seq = e.seq, task, job, "{msg}"),
        (TaskState::Failed, Some(TaskOutcome::Cancelled)) => {
            info!(target: "rqd.events", seq = e.seq, task, job, outcome = "cancelled", "{msg}")
        }
        (TaskState::Failed, Some(TaskOutcome::LaunchFailure { message })) => error!(
            target: "rqd.events",
            seq = e.seq,
            task,
            job,
            reason = message.as_str(),
            "task process could not be started"
        ),
        (TaskState::Failed, Some(outcome)) => warn!(
            target: "rqd.events",
            seq = e.seq,
            task,
            job,
            outcome = outcome.as_label(),
            exit_code = outcome.exit_code(),
            "{msg}"
        ),
        (TaskState::Failed, None) => {
            error!(target: "rqd.events", seq = e.seq, task, job, "failed event without an outcome")
        }
    }
}
