use std::time::Duration;

use super::BackoffConfig;
use crate::CoreError;

/// Coordinator connectivity settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Coordinator endpoints, tried round-robin on failure.
    pub endpoints: Vec<String>,
    /// Period of host status reports while connected.
    pub report_interval: Duration,
    /// Upper bound for connect plus registration.
    pub connect_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl AgentConfig {
    pub fn new(endpoints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            report_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(CoreError::InvalidConfig(
                "at least one coordinator endpoint is required".into(),
            ));
        }
        if self.report_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "report interval must be > 0".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "connect timeout must be > 0".into(),
            ));
        }
        if !self.backoff.is_valid() {
            return Err(CoreError::InvalidConfig(format!(
                "invalid backoff {:?}: need 0 < first <= max and factor >= 1",
                self.backoff
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_an_endpoint() {
        assert!(AgentConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(AgentConfig::new([" "]).validate().is_err());
        assert!(AgentConfig::new(["http://cuebot:8443"]).validate().is_ok());
    }

    #[test]
    fn rejects_zero_interval() {
        let cfg = AgentConfig::new(["a"]).with_report_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }
}
