use std::{io, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use rqd_core::{LaunchError, LaunchRequest, OutputSink, OutputStream, ProcessHandle};
use rqd_model::{ExitOutcome, TaskId};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    task::JoinHandle,
    time,
};
use tracing::{debug, trace, warn};

use crate::{
    limits::{RlimitConfig, attach_rlimits},
    signal,
};

/// How long to keep collecting output after the process exited. Pipes stay
/// open as long as a grandchild holds them.
const OUTPUT_DRAIN: Duration = Duration::from_secs(2);

/// One running task subprocess.
///
/// The child leads its own process group; termination signals go to the
/// whole group so renderer helpers die with it. The group is killed once the
/// leader exits and again when the `TaskProcess` is dropped.
pub struct TaskProcess {
    task_id: TaskId,
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitOutcome>,
    readers: Vec<JoinHandle<()>>,
}

impl TaskProcess {
    pub fn spawn(request: &LaunchRequest, limits: &RlimitConfig) -> Result<Self, LaunchError> {
        if let Some(cwd) = &request.cwd
            && !cwd.is_dir()
        {
            return Err(LaunchError::InvalidWorkingDir(cwd.display().to_string()));
        }

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .envs(request.env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(target_os = "linux")]
        die_with_parent(&mut cmd);
        attach_rlimits(&mut cmd, limits);

        trace!(target: "rqd.exec.proc", task_id = %request.task_id, program = %request.program, args = ?request.args, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|err| LaunchError::from_spawn(&request.program, &err))?;
        let pid = child.id();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward(
                stdout,
                request.task_id.clone(),
                OutputStream::Stdout,
                Arc::clone(&request.output),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward(
                stderr,
                request.task_id.clone(),
                OutputStream::Stderr,
                Arc::clone(&request.output),
            ));
        }

        debug!(target: "rqd.exec.proc", task_id = %request.task_id, ?pid, "spawned");
        Ok(Self {
            task_id: request.task_id.clone(),
            child,
            pid,
            exit: None,
            readers,
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Exit outcome, if the child has been reaped.
    pub fn exit(&self) -> Option<ExitOutcome> {
        self.exit
    }

    /// Wait for the leader, then clear out whatever it left behind in its
    /// group and collect the remaining output.
    ///
    /// Cancel-safe: readers leave `self.readers` only once they finished, so
    /// a dropped call resumes draining on the next one.
    async fn reap(&mut self) -> io::Result<ExitOutcome> {
        let exit = match self.exit {
            Some(exit) => exit,
            None => {
                let status = self.child.wait().await?;
                let exit = exit_outcome(status);
                self.exit = Some(exit);
                debug!(target: "rqd.exec.proc", task_id = %self.task_id, ?exit, "exited");
                self.kill_leftovers();
                exit
            }
        };
        self.drain_output().await;
        Ok(exit)
    }

    /// Background helpers started by the task must not outlive it, whatever
    /// way the leader ended.
    fn kill_leftovers(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid
            && let Err(err) = signal::kill_group(pid)
        {
            warn!(target: "rqd.exec.proc", task_id = %self.task_id, pid, error = %err, "cannot kill leftover group members");
        }
    }

    async fn drain_output(&mut self) {
        while let Some(reader) = self.readers.last_mut() {
            if time::timeout(OUTPUT_DRAIN, &mut *reader).await.is_err() {
                warn!(target: "rqd.exec.proc", task_id = %self.task_id, "output still open after exit; dropping the rest");
                reader.abort();
            }
            self.readers.pop();
        }
    }
}

#[async_trait]
impl ProcessHandle for TaskProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> io::Result<ExitOutcome> {
        self.reap().await
    }

    async fn kill(&mut self, grace: Duration) -> io::Result<ExitOutcome> {
        if self.exit.is_some() {
            return self.reap().await;
        }
        let Some(pid) = self.pid else {
            return self.reap().await;
        };

        debug!(target: "rqd.exec.proc", task_id = %self.task_id, pid, ?grace, "terminating process group");
        #[cfg(unix)]
        signal::terminate_group(pid)?;
        #[cfg(not(unix))]
        self.child.start_kill()?;

        if time::timeout(grace, self.child.wait()).await.is_err() {
            warn!(target: "rqd.exec.proc", task_id = %self.task_id, pid, "grace period expired; sending SIGKILL");
            #[cfg(unix)]
            signal::kill_group(pid)?;
            self.child.start_kill().or_else(ignore_reaped)?;
        }
        self.reap().await
    }

    fn is_responsive(&self) -> bool {
        if self.exit.is_some() {
            return true;
        }
        match self.pid.and_then(signal::proc_state) {
            Some(state) => !signal::is_stopped(state),
            // Gone or not observable here: `wait` reports what happened.
            None => true,
        }
    }
}

impl Drop for TaskProcess {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            let _ = signal::kill_group(pid);
        }
        // kill_on_drop covers the leader itself.
        for reader in &self.readers {
            reader.abort();
        }
    }
}

/// `start_kill` on an already reaped child reports `InvalidInput`.
fn ignore_reaped(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::InvalidInput {
        Ok(())
    } else {
        Err(err)
    }
}

fn exit_outcome(status: std::process::ExitStatus) -> ExitOutcome {
    match status.code() {
        Some(0) => ExitOutcome::Success,
        Some(code) => ExitOutcome::Failure { code },
        None => {
            #[cfg(unix)]
            let signal = std::os::unix::process::ExitStatusExt::signal(&status);
            #[cfg(not(unix))]
            let signal = None;
            ExitOutcome::Killed { signal }
        }
    }
}

/// Make the kernel SIGKILL the child if the agent dies first.
#[cfg(target_os = "linux")]
fn die_with_parent(cmd: &mut Command) {
    // SAFETY: prctl(2) is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| {
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

fn forward<R>(
    stream: R,
    task_id: TaskId,
    kind: OutputStream,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    sink.on_line(&task_id, kind, line.trim_end_matches(['\n', '\r']));
                }
                Err(err) => {
                    debug!(target: "rqd.exec.output", %task_id, stream = %kind, error = %err, "output read failed");
                    break;
                }
            }
        }
    })
}
