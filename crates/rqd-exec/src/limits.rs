//! POSIX rlimits applied to task processes.
//!
//! Limits are set inside a `pre_exec` hook, in the child after `fork()` and
//! before `execve()`, so the renderer never runs unrestricted. Non-Unix
//! targets log a warning and ignore them.
use tokio::process::Command;
#[cfg(not(unix))]
use tracing::warn;

/// Per-process limits. `None` keeps the inherited limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlimitConfig {
    /// `RLIMIT_NOFILE`.
    pub max_open_files: Option<u64>,
    /// `RLIMIT_FSIZE`, in bytes. Writing past it raises `SIGXFSZ`.
    pub max_file_size_bytes: Option<u64>,
    /// `RLIMIT_CORE = 0`. Crashing renderers can otherwise fill the scratch
    /// disk with multi-gigabyte cores.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && self.max_file_size_bytes.is_none()
            && !self.disable_core_dumps
    }
}

pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    unix_impl::attach_rlimits(cmd, config);

    #[cfg(not(unix))]
    {
        let _ = cmd;
        warn!(target: "rqd.exec.limits", ?config, "rlimits are not supported on this platform; ignoring");
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::RlimitConfig;

    pub(super) fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
        let RlimitConfig {
            max_open_files,
            max_file_size_bytes,
            disable_core_dumps,
        } = config.clone();

        // SAFETY: the hook only calls setrlimit(2), which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(nofile) = max_open_files {
                    check(libc::setrlimit(libc::RLIMIT_NOFILE, &rlim(nofile)))?;
                }
                if let Some(fsize) = max_file_size_bytes {
                    check(libc::setrlimit(libc::RLIMIT_FSIZE, &rlim(fsize)))?;
                }
                if disable_core_dumps {
                    check(libc::setrlimit(libc::RLIMIT_CORE, &rlim(0)))?;
                }
                Ok(())
            });
        }
    }

    fn rlim(value: u64) -> libc::rlimit {
        libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        }
    }

    fn check(rc: libc::c_int) -> io::Result<()> {
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
