use std::{path::PathBuf, time::Duration};

use rqd_model::TaskEnv;

use crate::CoreError;

/// Minimum ratio between heartbeat timeout and heartbeat interval.
pub const HEARTBEAT_SAFETY_FACTOR: u32 = 3;

/// Timing and environment settings applied to every task.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How often the monitor probes a running process.
    pub heartbeat_interval: Duration,
    /// How long a process may stay unresponsive before it is killed and the
    /// task fails with `Timeout`.
    pub heartbeat_timeout: Duration,
    /// Time between the polite termination signal and the forced kill.
    pub kill_grace: Duration,
    /// Working directory for tasks that do not name one.
    pub default_working_dir: Option<PathBuf>,
    /// Variables added to every task, below the `CUE_*` set and the
    /// assignment's own environment.
    pub base_env: TaskEnv,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(60),
            kill_grace: Duration::from_secs(10),
            default_working_dir: None,
            base_env: TaskEnv::new(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.heartbeat_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "heartbeat interval must be > 0".into(),
            ));
        }
        if self.heartbeat_timeout < self.heartbeat_interval * HEARTBEAT_SAFETY_FACTOR {
            return Err(CoreError::InvalidConfig(format!(
                "heartbeat timeout {:?} must be at least {}x the interval {:?}",
                self.heartbeat_timeout, HEARTBEAT_SAFETY_FACTOR, self.heartbeat_interval
            )));
        }
        Ok(())
    }
}
