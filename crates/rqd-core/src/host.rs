//! Host introspection: identity and the resources offered to the ledger.
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Instant,
};

use rqd_model::{HostResources, MemoryMb, ResourceSet};
use tracing::{debug, warn};

const AGENT_ID_FILE: &str = "/var/lib/rqd/agent-id";

/// Who this agent is, as reported to the coordinator.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub agent_id: String,
    pub hostname: String,
    started: Instant,
}

impl HostIdentity {
    pub fn new(agent_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            hostname: hostname.into(),
            started: Instant::now(),
        }
    }

    /// Identity of the local machine. The agent id is persisted so it
    /// survives restarts; a fresh one is generated if no file is readable.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        let agent_id = load_or_create_id(&agent_id_paths());
        Self::new(agent_id, hostname)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

/// Pretty OS name from `/etc/os-release`, or the platform name.
pub fn os_info() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = fs::read_to_string("/etc/os-release") {
            for line in content.lines() {
                if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                    return name.trim_matches('"').to_string();
                }
            }
        }
    }

    platform().to_string()
}

fn agent_id_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(AGENT_ID_FILE)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(Path::new(&home).join(".rqd").join("agent-id"));
    }
    paths
}

fn load_or_create_id(paths: &[PathBuf]) -> String {
    for path in paths {
        if let Ok(id) = fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    for path in paths {
        match persist_id(path, &id) {
            Ok(()) => {
                debug!(target: "rqd.core.host", path = %path.display(), "agent id persisted");
                return id;
            }
            Err(err) => {
                debug!(target: "rqd.core.host", path = %path.display(), error = %err, "cannot persist agent id")
            }
        }
    }
    warn!(target: "rqd.core.host", "agent id not persisted; it will change on restart");
    id
}

fn persist_id(path: &Path, id: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{id}\n"))
}

/// Operator-provided replacements for detected amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceOverrides {
    pub cores: Option<u32>,
    pub memory_mb: Option<MemoryMb>,
    pub gpus: Option<u32>,
}

/// Resources this host offers, with overrides replacing detected values.
pub fn detect_resources(overrides: &ResourceOverrides) -> HostResources {
    let detected = ResourceSet::new(detect_cores(), detect_memory_mb(), detect_gpus());
    let total = ResourceSet::new(
        overrides.cores.unwrap_or(detected.cores),
        overrides.memory_mb.unwrap_or(detected.memory_mb),
        overrides.gpus.unwrap_or(detected.gpu_units),
    );
    debug!(target: "rqd.core.host", ?detected, ?total, "host resources");
    HostResources::new(total)
}

fn detect_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

fn detect_memory_mb() -> MemoryMb {
    memory_mb_from(fs::read_to_string("/proc/meminfo"))
}

/// Zero when `/proc/meminfo` is unusable; every memory request is then
/// rejected unless `memory_mb` is configured.
fn memory_mb_from(meminfo: io::Result<String>) -> MemoryMb {
    let parsed = match meminfo {
        Ok(text) => parse_meminfo_total_mb(&text).ok_or_else(|| "no MemTotal line".to_string()),
        Err(err) => Err(err.to_string()),
    };
    parsed.unwrap_or_else(|reason| {
        warn!(target: "rqd.core.host", %reason, "cannot detect host memory; set resources.memoryMb");
        0
    })
}

/// `MemTotal` from `/proc/meminfo` in MB.
fn parse_meminfo_total_mb(meminfo: &str) -> Option<MemoryMb> {
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}

fn detect_gpus() -> u32 {
    let Ok(entries) = fs::read_dir("/dev") else {
        return 0;
    };
    let names = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned());
    count_nvidia_devices(names)
}

/// Counts `nvidiaN` device nodes, ignoring `nvidiactl`, `nvidia-uvm` and
/// friends.
fn count_nvidia_devices(names: impl Iterator<Item = String>) -> u32 {
    names
        .filter(|name| {
            name.strip_prefix("nvidia")
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .count() as u32
}
