//! Daemon configuration: an optional JSON file, then `RQD_*` overrides.
use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use rqd_core::{AgentConfig, BackoffConfig, ResourceOverrides, RunnerConfig};
use rqd_exec::limits::RlimitConfig;
use rqd_observe::{LoggerConfig, LoggerFormat};
use rqd_report::ReportTransport;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Env { key: &'static str, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackoffSection {
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffSection {
    fn default() -> Self {
        let d = BackoffConfig::default();
        Self {
            first_ms: d.first_ms,
            max_ms: d.max_ms,
            factor: d.factor,
        }
    }
}

/// Caps replacing the detected amounts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceSection {
    pub cores: Option<u32>,
    pub memory_mb: Option<u64>,
    pub gpus: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimitSection {
    pub max_open_files: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    pub disable_core_dumps: bool,
}

impl Default for LimitSection {
    fn default() -> Self {
        Self {
            max_open_files: None,
            max_file_size_bytes: None,
            disable_core_dumps: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentdConfig {
    pub coordinators: Vec<String>,
    pub transport: ReportTransport,
    /// Labels sent with the registration.
    pub metadata: HashMap<String, String>,
    pub grpc_listen: Option<SocketAddr>,
    pub http_listen: Option<SocketAddr>,
    pub report_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub kill_grace_ms: u64,
    pub backoff: BackoffSection,
    pub resources: ResourceSection,
    pub working_dir: Option<PathBuf>,
    /// One `<task-id>.log` per task when set.
    pub log_dir: Option<PathBuf>,
    pub limits: LimitSection,
    pub logger: LoggerConfig,
    pub inbox_capacity: usize,
}

impl Default for AgentdConfig {
    fn default() -> Self {
        Self {
            coordinators: Vec::new(),
            transport: ReportTransport::Grpc,
            metadata: HashMap::new(),
            grpc_listen: Some(SocketAddr::from(([0, 0, 0, 0], 8444))),
            http_listen: Some(SocketAddr::from(([0, 0, 0, 0], 8445))),
            report_interval_ms: 10_000,
            connect_timeout_ms: 5_000,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 60_000,
            kill_grace_ms: 10_000,
            backoff: BackoffSection::default(),
            resources: ResourceSection::default(),
            working_dir: None,
            log_dir: None,
            limits: LimitSection::default(),
            logger: LoggerConfig::default(),
            inbox_capacity: 64,
        }
    }
}

fn parse_addr(key: &'static str, value: &str) -> Result<Option<SocketAddr>, ConfigError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e| ConfigError::Env {
        key,
        reason: format!("{value}: {e}"),
    })
}

impl AgentdConfig {
    /// Read `path`, or start from defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `RQD_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("RQD_COORDINATORS") {
            self.coordinators = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("RQD_TRANSPORT") {
            self.transport = v.parse().map_err(|reason| ConfigError::Env {
                key: "RQD_TRANSPORT",
                reason,
            })?;
        }
        if let Some(v) = lookup("RQD_LOG_LEVEL") {
            self.logger.level = v;
        }
        if let Some(v) = lookup("RQD_LOG_FORMAT") {
            self.logger.format = v.parse::<LoggerFormat>().map_err(|e| ConfigError::Env {
                key: "RQD_LOG_FORMAT",
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = lookup("RQD_GRPC_LISTEN") {
            self.grpc_listen = parse_addr("RQD_GRPC_LISTEN", &v)?;
        }
        if let Some(v) = lookup("RQD_HTTP_LISTEN") {
            self.http_listen = parse_addr("RQD_HTTP_LISTEN", &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Invalid("inbox capacity must be > 0".into()));
        }
        if self.kill_grace_ms == 0 {
            return Err(ConfigError::Invalid("kill grace must be > 0".into()));
        }
        let invalid = |e: rqd_core::CoreError| ConfigError::Invalid(e.to_string());
        self.agent_config().validate().map_err(invalid)?;
        self.runner_config().validate().map_err(invalid)?;
        Ok(())
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::new(self.coordinators.iter().cloned())
            .with_report_interval(Duration::from_millis(self.report_interval_ms))
            .with_connect_timeout(self.connect_timeout())
            .with_backoff(BackoffConfig {
                first_ms: self.backoff.first_ms,
                max_ms: self.backoff.max_ms,
                factor: self.backoff.factor,
            })
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
            default_working_dir: self.working_dir.clone(),
            ..RunnerConfig::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn overrides(&self) -> ResourceOverrides {
        ResourceOverrides {
            cores: self.resources.cores,
            memory_mb: self.resources.memory_mb,
            gpus: self.resources.gpus,
        }
    }

    pub fn rlimits(&self) -> RlimitConfig {
        RlimitConfig {
            max_open_files: self.limits.max_open_files,
            max_file_size_bytes: self.limits.max_file_size_bytes,
            disable_core_dumps: self.limits.disable_core_dumps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_need_a_coordinator() {
        let cfg = AgentdConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let cfg = cfg.apply_env(env(&[("RQD_COORDINATORS", "http://cuebot:8443")])).unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AgentdConfig = serde_json::from_str(
            r#"{
                "coordinators": ["http://a:8443", "http://b:8443"],
                "transport": "http",
                "heartbeatIntervalMs": 1000,
                "heartbeatTimeoutMs": 3000,
                "resources": { "cores": 8 },
                "logger": { "format": "json" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.coordinators.len(), 2);
        assert_eq!(cfg.transport, ReportTransport::Http);
        assert_eq!(cfg.resources.cores, Some(8));
        assert_eq!(cfg.resources.memory_mb, None);
        assert_eq!(cfg.logger.format, LoggerFormat::Json);
        assert_eq!(cfg.kill_grace_ms, 10_000);
        assert!(cfg.limits.disable_core_dumps);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn heartbeat_timeout_needs_margin() {
        let cfg = AgentdConfig {
            coordinators: vec!["http://a".into()],
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 10_000,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn backoff_bounds_are_checked() {
        let cfg = AgentdConfig {
            coordinators: vec!["http://a".into()],
            backoff: BackoffSection {
                first_ms: 5_000,
                max_ms: 1_000,
                factor: 2.0,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides() {
        let cfg = AgentdConfig::default()
            .apply_env(env(&[
                ("RQD_COORDINATORS", " http://a:1 , ,http://b:2 "),
                ("RQD_TRANSPORT", "HTTP"),
                ("RQD_LOG_LEVEL", "debug,rqd.exec.output=warn"),
                ("RQD_LOG_FORMAT", "json"),
                ("RQD_GRPC_LISTEN", "off"),
                ("RQD_HTTP_LISTEN", "127.0.0.1:9000"),
            ]))
            .unwrap();
        assert_eq!(cfg.coordinators, vec!["http://a:1", "http://b:2"]);
        assert_eq!(cfg.transport, ReportTransport::Http);
        assert_eq!(cfg.logger.level, "debug,rqd.exec.output=warn");
        assert_eq!(cfg.logger.format, LoggerFormat::Json);
        assert_eq!(cfg.grpc_listen, None);
        assert_eq!(cfg.http_listen, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn bad_env_values_are_reported() {
        let err = AgentdConfig::default()
            .apply_env(env(&[("RQD_TRANSPORT", "smtp")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "RQD_TRANSPORT", .. }));

        let err = AgentdConfig::default()
            .apply_env(env(&[("RQD_HTTP_LISTEN", "localhost")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "RQD_HTTP_LISTEN", .. }));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let missing = AgentdConfig::load(Some(Path::new("/nonexistent/rqd.json")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let path = std::env::temp_dir().join(format!("rqd-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let malformed = AgentdConfig::load(Some(&path));
        assert!(matches!(malformed, Err(ConfigError::Parse { .. })));
        let _ = fs::remove_file(&path);

        assert!(AgentdConfig::load(None).is_ok());
    }

    #[test]
    fn conversions() {
        let cfg = AgentdConfig {
            resources: ResourceSection {
                cores: Some(4),
                memory_mb: Some(2048),
                gpus: None,
            },
            working_dir: Some(PathBuf::from("/scratch")),
            ..Default::default()
        };
        assert_eq!(cfg.overrides().cores, Some(4));
        assert_eq!(cfg.overrides().gpus, None);
        assert_eq!(
            cfg.runner_config().default_working_dir,
            Some(PathBuf::from("/scratch"))
        );
        assert!(cfg.rlimits().disable_core_dumps);
    }
}
