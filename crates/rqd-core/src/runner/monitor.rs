use std::sync::Arc;

use rqd_model::{TaskOutcome, TaskState};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{Shared, frames, task::RunningTask};
use crate::{LaunchRequest, ProcessHandle};

/// Drive one task from `Pending` to its terminal state.
pub(super) async fn run_task(shared: Arc<Shared>, mut task: RunningTask, cancel: CancellationToken) {
    let span = info_span!(
        target: "rqd.core.runner",
        "task",
        task_id = %task.id(),
        job_id = %task.assignment.job_id
    );
    async move {
        let outcome = drive(&shared, &mut task, &cancel).await;
        finish(&shared, &mut task, outcome);
    }
    .instrument(span)
    .await
}

fn publish(shared: &Shared, task: &RunningTask) {
    let info = task.info();
    shared.table.update(info.clone());
    shared.events.publish(&info);
}

async fn drive(shared: &Shared, task: &mut RunningTask, cancel: &CancellationToken) -> TaskOutcome {
    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled;
    }

    task.transition(TaskState::Launching);
    publish(shared, task);

    let assignment = &task.assignment;
    let mut argv = frames::expand_command(assignment).into_iter();
    let Some(program) = argv.next() else {
        return TaskOutcome::LaunchFailure {
            message: "empty command".into(),
        };
    };
    let request = LaunchRequest {
        task_id: assignment.task_id.clone(),
        program,
        args: argv.collect(),
        env: frames::task_env(&shared.config.base_env, assignment),
        cwd: assignment
            .working_dir
            .clone()
            .or_else(|| shared.config.default_working_dir.clone()),
        output: Arc::clone(&shared.output),
    };
    debug!(target: "rqd.core.runner", launcher = shared.launcher.name(), ?request, "launching");

    let launched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return TaskOutcome::Cancelled,
        res = shared.launcher.launch(request) => res,
    };
    let mut handle = match launched {
        Ok(handle) => handle,
        Err(err) => {
            warn!(target: "rqd.core.runner", error = %err, "launch failed");
            return TaskOutcome::LaunchFailure {
                message: err.to_string(),
            };
        }
    };

    task.set_pid(handle.pid());
    task.transition(TaskState::Running);
    publish(shared, task);
    shared.metrics.task_started();
    info!(target: "rqd.core.runner", pid = ?handle.pid(), "task running");

    supervise(shared, task, handle.as_mut(), cancel).await
}

async fn supervise(
    shared: &Shared,
    task: &mut RunningTask,
    handle: &mut dyn ProcessHandle,
    cancel: &CancellationToken,
) -> TaskOutcome {
    let interval = shared.config.heartbeat_interval;
    let timeout = shared.config.heartbeat_timeout;
    let mut heartbeat = time::interval_at(Instant::now() + interval, interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                kill(shared, task, handle).await;
                return TaskOutcome::Cancelled;
            }
            res = handle.wait() => {
                return match res {
                    Ok(exit) => TaskOutcome::from(exit),
                    Err(err) => {
                        error!(target: "rqd.core.runner", error = %err, "wait failed; killing process");
                        let _ = handle.kill(shared.config.kill_grace).await;
                        TaskOutcome::Killed { signal: None }
                    }
                };
            }
            _ = heartbeat.tick() => {
                if handle.is_responsive() {
                    task.heartbeat();
                    shared.table.update(task.info());
                } else if task.since_heartbeat() >= timeout {
                    warn!(
                        target: "rqd.core.runner",
                        silent_for = ?task.since_heartbeat(),
                        "heartbeat timeout; killing process"
                    );
                    kill(shared, task, handle).await;
                    return TaskOutcome::Timeout;
                } else {
                    debug!(target: "rqd.core.runner", silent_for = ?task.since_heartbeat(), "process unresponsive");
                }
            }
        }
    }
}

async fn kill(shared: &Shared, task: &mut RunningTask, handle: &mut dyn ProcessHandle) {
    task.transition(TaskState::Killing);
    publish(shared, task);
    match handle.kill(shared.config.kill_grace).await {
        Ok(exit) => debug!(target: "rqd.core.runner", ?exit, "process terminated"),
        Err(err) => error!(target: "rqd.core.runner", error = %err, "kill failed"),
    }
}

/// Release the reservation, publish the terminal state and drop the task's
/// cancellation handle. Runs exactly once per task.
fn finish(shared: &Shared, task: &mut RunningTask, outcome: TaskOutcome) {
    let task_id = task.id().clone();
    let duration = task.run_duration();

    if shared.ledger.release(&task_id).is_none() {
        error!(target: "rqd.core.runner", %task_id, "no reservation held at task completion");
        debug_assert!(false, "task {task_id} finished without a reservation");
    }

    task.finish(outcome.clone());
    publish(shared, task);

    shared.metrics.task_finished(&outcome, duration);
    shared.metrics.resources(&shared.ledger.snapshot());
    shared.output.on_close(&task_id);
    shared.forget_control(&task_id);

    if outcome.is_success() {
        info!(target: "rqd.core.runner", ?duration, "task completed");
    } else {
        info!(target: "rqd.core.runner", ?duration, %outcome, "task failed");
    }
}
