//! OS process primitives: liveness probe, graceful terminate, forceful kill.
//!
//! These act on bare PIDs with no `Child` handle, so they cannot reap. A PID that
//! belongs to a zombie still answers the null signal on some platforms; on Linux
//! zombies are reported as dead.

use std::io;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Outcome of delivering a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    /// The signal was queued for the process
    Sent,
    /// No process with that PID exists
    NoSuchProcess,
}

/// Check if a PID exists without signalling it.
///
/// Uses `kill` with the null signal. A process we lack permission to signal still
/// exists, so EPERM counts as alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Some(nix_pid) = to_nix_pid(pid) else {
        return false;
    };

    match signal::kill(nix_pid, None) {
        Ok(_) => !is_zombie(pid),
        Err(Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Send SIGTERM.
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<SignalDelivery> {
    send(pid, Signal::SIGTERM)
}

/// Send SIGKILL. Delivery is unconditional once `Sent` is returned.
#[cfg(unix)]
pub fn force_kill(pid: u32) -> io::Result<SignalDelivery> {
    send(pid, Signal::SIGKILL)
}

#[cfg(not(unix))]
pub fn terminate(_pid: u32) -> io::Result<SignalDelivery> {
    Err(unsupported())
}

#[cfg(not(unix))]
pub fn force_kill(_pid: u32) -> io::Result<SignalDelivery> {
    Err(unsupported())
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "signalling processes by PID is only supported on Unix",
    )
}

#[cfg(unix)]
fn send(pid: u32, sig: Signal) -> io::Result<SignalDelivery> {
    let Some(nix_pid) = to_nix_pid(pid) else {
        return Ok(SignalDelivery::NoSuchProcess);
    };

    match signal::kill(nix_pid, sig) {
        Ok(()) => Ok(SignalDelivery::Sent),
        Err(Errno::ESRCH) => Ok(SignalDelivery::NoSuchProcess),
        Err(e) => Err(io::Error::from_raw_os_error(e as i32)),
    }
}

/// PIDs 0 and above `i32::MAX` would address process groups or wrap; never signal them.
#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // /proc/<pid>/stat: "<pid> (<comm>) <state> ..."; comm may contain spaces or ')'
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };

    stat.rfind(')')
        .and_then(|idx| stat[idx + 1..].split_whitespace().next())
        .map(|state| state == "Z")
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn is_alive_for_self() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn is_alive_false_for_impossible_pid() {
        assert!(!is_alive(999_999_999));
        assert!(!is_alive(0));
    }

    #[test]
    #[cfg(unix)]
    fn terminate_reports_missing_process() {
        assert_eq!(terminate(999_999_999).unwrap(), SignalDelivery::NoSuchProcess);
    }

    #[test]
    #[cfg(unix)]
    fn terminate_stops_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id();

        assert!(is_alive(pid));
        assert_eq!(terminate(pid).unwrap(), SignalDelivery::Sent);

        // Reap so the PID is released
        let _ = child.wait();
        assert!(!is_alive(pid));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn zombie_counts_as_dead() {
        let mut child = std::process::Command::new("true")
            .spawn()
            .expect("failed to spawn true");
        let pid = child.id();

        // Give it time to exit without reaping it
        std::thread::sleep(std::time::Duration::from_millis(300));
        assert!(!is_alive(pid));

        let _ = child.wait();
    }
}
