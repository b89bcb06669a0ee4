use async_trait::async_trait;
use rqd_core::{LaunchError, LaunchRequest, Launcher, ProcessHandle};

use crate::{RlimitConfig, TaskProcess};

/// Launches task commands as local subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    limits: RlimitConfig,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: RlimitConfig) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let process = TaskProcess::spawn(&request, &self.limits)?;
        Ok(Box::new(process))
    }
}
