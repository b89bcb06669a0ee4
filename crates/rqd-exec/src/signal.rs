//! Process-group signalling and `/proc` probes.
use std::io;

/// Send `sig` to every process in the group led by `pid`.
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub(crate) fn signal_group(pid: u32, sig: libc::c_int) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"));
    };
    // SAFETY: kill(2) with a negative pid only sends a signal.
    let rc = unsafe { libc::kill(-pgid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Polite termination: SIGTERM, plus SIGCONT so a stopped group can act on it.
#[cfg(unix)]
pub(crate) fn terminate_group(pid: u32) -> io::Result<()> {
    signal_group(pid, libc::SIGTERM)?;
    signal_group(pid, libc::SIGCONT)
}

#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) -> io::Result<()> {
    signal_group(pid, libc::SIGKILL)
}

/// Scheduler state letter from `/proc/<pid>/stat`.
pub(crate) fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat_state(&stat)
}

/// The comm field may contain spaces and parentheses, so the state is the
/// first field after the last `)`.
fn parse_stat_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// `T` (stopped) and `t` (tracing stop) processes cannot make progress.
pub(crate) fn is_stopped(state: char) -> bool {
    matches!(state, 'T' | 't')
}
