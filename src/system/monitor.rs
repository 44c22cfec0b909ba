// src/system/monitor.rs

//! Exit-status tracking for a child process identified only by its pid.
//!
//! This module calls `waitpid(2)` directly, which is the only way to reap a child that was not
//! launched through an object that owns its lifecycle.

use crate::constants::{WAIT_INITIAL_BACKOFF, WAIT_MAX_BACKOFF};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::fmt;
use std::thread;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// The child called `exit` (or returned from `main`) with this code.
    Exited(i32),
    /// The child was terminated by this signal.
    Signaled(i32),
    /// The child can no longer be waited on (it was reaped elsewhere, or is not our child).
    Unavailable,
}

impl ExitStatus {
    /// Returns the status as a single integer, the way a shell reports `$?`.
    ///
    /// Signal terminations map to `128 + signal`, an unavailable status maps to `-1`.
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => 128 + signal,
            Self::Unavailable => -1,
        }
    }

    /// The terminating signal, if the child was killed by one.
    pub fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(signal) => Some(*signal),
            _ => None,
        }
    }

    /// `true` only for a normal exit with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Decodes a `waitpid` result. Stopped/continued notifications yield `None`.
    pub(crate) fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Self::Signaled(signal as i32)),
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {}", code),
            Self::Signaled(signal) => write!(f, "terminated by signal {}", signal),
            Self::Unavailable => write!(f, "exit status unavailable"),
        }
    }
}

/// Answers "is it running" / "has it finished" / "what did it exit with" for a child pid.
///
/// The first decoded exit status is cached; once known, no further `waitpid` call is issued,
/// so the pid is never touched again after it has been reaped (the OS may hand it to another
/// process).
#[derive(Debug, Clone)]
pub struct ChildProcessMonitor {
    pid: libc::pid_t,
    exit_status: Option<ExitStatus>,
    last_errno: Option<Errno>,
}

impl ChildProcessMonitor {
    /// Creates a monitor for `pid`. Nothing is checked until the first query.
    pub fn new(pid: libc::pid_t) -> Self {
        Self {
            pid,
            exit_status: None,
            last_errno: None,
        }
    }

    /// The monitored process id.
    pub fn pid(&self) -> libc::pid_t {
        self.pid
    }

    /// Non-blocking poll.
    ///
    /// Returns `None` while the child runs, and also when the pid does not exist or is not a
    /// child of this process. Those cases are "not running", not errors.
    pub fn status(&mut self) -> Option<ExitStatus> {
        self.wait(false)
    }

    /// `false` once an exit status is recorded or the last wait reported that there is no such
    /// process / no child to wait for.
    pub fn is_running(&mut self) -> bool {
        self.wait(false);

        if self.exit_status.is_some() {
            return false;
        }
        !matches!(self.last_errno, Some(Errno::ESRCH) | Some(Errno::ECHILD))
    }

    /// `true` once an exit status has been recorded.
    pub fn did_finish_running(&mut self) -> bool {
        self.wait(false);
        self.exit_status.is_some()
    }

    /// Blocks the calling thread until the child ends.
    ///
    /// Interrupted waits are retried transparently. If the pid cannot be waited on at all the
    /// result is [`ExitStatus::Unavailable`], which is cached like any other status.
    pub fn wait_status(&mut self) -> ExitStatus {
        if let Some(status) = self.wait(true) {
            return status;
        }
        log::debug!(
            "Blocking wait on pid {} failed (errno {:?}); recording status as unavailable.",
            self.pid,
            self.last_errno
        );
        self.exit_status = Some(ExitStatus::Unavailable);
        ExitStatus::Unavailable
    }

    fn wait(&mut self, should_block: bool) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        // 0 and negative pids address process groups in waitpid; never reap those.
        if self.pid <= 0 {
            self.last_errno = Some(Errno::ECHILD);
            return None;
        }

        let options = if should_block {
            None
        } else {
            Some(WaitPidFlag::WNOHANG)
        };
        let mut backoff = WAIT_INITIAL_BACKOFF;

        loop {
            let raw_status = match waitpid(Pid::from_raw(self.pid), options) {
                Ok(status) => status,
                Err(Errno::EINTR) => {
                    log::trace!(
                        "waitpid({}) interrupted, retrying in {:?}",
                        self.pid,
                        backoff
                    );
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(WAIT_MAX_BACKOFF);
                    continue;
                }
                Err(errno) => {
                    log::debug!("waitpid({}) failed: {}", self.pid, errno);
                    self.last_errno = Some(errno);
                    return None;
                }
            };

            self.last_errno = None;
            if raw_status == WaitStatus::StillAlive {
                // WNOHANG and the child has not changed state yet.
                return None;
            }

            match ExitStatus::from_wait_status(raw_status) {
                Some(status) => {
                    log::debug!("Child {} finished with {}", self.pid, status);
                    self.exit_status = Some(status);
                    return Some(status);
                }
                None if should_block => continue,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use std::process::Command;
    use std::time::Duration;

    fn spawn_pid(program: &str, args: &[&str]) -> libc::pid_t {
        let child = Command::new(program)
            .args(args)
            .spawn()
            .expect("failed to spawn test child");
        libc::pid_t::try_from(child.id()).expect("pid out of range")
    }

    #[test]
    fn test_nonexistent_pid_has_no_status() {
        let mut monitor = ChildProcessMonitor::new(libc::pid_t::MAX);
        assert_eq!(monitor.status(), None);
        assert!(!monitor.is_running());
        assert!(!monitor.did_finish_running());
    }

    #[test]
    fn test_pid_that_is_not_a_child_is_not_running() {
        // pid 1 always exists and is never our child.
        let mut monitor = ChildProcessMonitor::new(1);
        assert_eq!(monitor.status(), None);
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_non_positive_pid_is_never_waited_on() {
        let mut monitor = ChildProcessMonitor::new(0);
        assert!(!monitor.is_running());
        assert_eq!(monitor.wait_status(), ExitStatus::Unavailable);
    }

    #[test]
    fn test_running_child_is_running_and_not_finished() {
        let mut monitor = ChildProcessMonitor::new(spawn_pid("sleep", &["2"]));

        assert!(monitor.is_running());
        assert!(!monitor.did_finish_running());
        assert_eq!(monitor.status(), None);

        assert_eq!(monitor.wait_status(), ExitStatus::Exited(0));
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_finished_child_is_complete_after_poll() {
        let mut monitor = ChildProcessMonitor::new(spawn_pid("true", &[]));
        thread::sleep(Duration::from_secs(1));

        assert!(monitor.did_finish_running());
        assert_eq!(monitor.status(), Some(ExitStatus::Exited(0)));
    }

    #[test]
    fn test_exit_code_is_decoded_and_cached() {
        let mut monitor = ChildProcessMonitor::new(spawn_pid("sh", &["-c", "exit 3"]));

        let first = monitor.wait_status();
        let second = monitor.wait_status();
        assert_eq!(first, ExitStatus::Exited(3));
        assert_eq!(first, second);
        assert_eq!(first.code(), 3);
        assert!(!first.success());
    }

    #[test]
    fn test_signaled_child_resolves() {
        let mut monitor = ChildProcessMonitor::new(spawn_pid("sh", &["-c", "kill -9 $$"]));

        let status = monitor.wait_status();
        assert_eq!(status, ExitStatus::Signaled(libc::SIGKILL));
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert_eq!(status.code(), 128 + libc::SIGKILL);
    }

    #[test]
    fn test_stopped_notifications_are_not_exit_statuses() {
        let pid = Pid::from_raw(4242);
        assert_eq!(
            ExitStatus::from_wait_status(WaitStatus::Exited(pid, 7)),
            Some(ExitStatus::Exited(7))
        );
        assert_eq!(
            ExitStatus::from_wait_status(WaitStatus::Signaled(pid, Signal::SIGTERM, false)),
            Some(ExitStatus::Signaled(libc::SIGTERM))
        );
        assert_eq!(
            ExitStatus::from_wait_status(WaitStatus::Stopped(pid, Signal::SIGSTOP)),
            None
        );
        assert_eq!(ExitStatus::from_wait_status(WaitStatus::StillAlive), None);
    }

    #[test]
    fn test_exit_status_display() {
        assert_eq!(ExitStatus::Exited(1).to_string(), "exit code 1");
        assert_eq!(ExitStatus::Signaled(15).to_string(), "terminated by signal 15");
        assert!(ExitStatus::Exited(0).success());
    }
}
