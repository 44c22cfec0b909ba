// src/system/handle.rs

//! The handle returned by a spawn call.
//!
//! A handle is backed either by a bare pid (pass-through launches) or by a pid plus the
//! stream endpoint pairs that feed its handlers (captured launches). Callers only ever see
//! [`ProcessHandle`]; which backing is in use is decided by the spawn call.

use crate::system::endpoint::StreamEndpointPair;
use crate::system::monitor::{ChildProcessMonitor, ExitStatus};

/// Queries shared by every kind of process handle.
pub trait ProcessStatus {
    /// `true` until the child's exit has been observed (or it turns out not to be our child).
    fn is_running(&mut self) -> bool;

    /// `true` once an exit status has been recorded.
    fn did_finish_running(&mut self) -> bool;

    /// Non-blocking poll for the exit status.
    fn status(&mut self) -> Option<ExitStatus>;

    /// Blocks until the child exits. Repeated calls return the cached status.
    ///
    /// Captured output still in flight is drained first, for at most
    /// [`PUMP_DRAIN_DEADLINE`](crate::constants::PUMP_DRAIN_DEADLINE) per stream.
    fn wait(&mut self) -> ExitStatus;
}

#[derive(Debug)]
struct PidHandle {
    monitor: ChildProcessMonitor,
}

impl ProcessStatus for PidHandle {
    fn is_running(&mut self) -> bool {
        self.monitor.is_running()
    }

    fn did_finish_running(&mut self) -> bool {
        self.monitor.did_finish_running()
    }

    fn status(&mut self) -> Option<ExitStatus> {
        self.monitor.status()
    }

    fn wait(&mut self) -> ExitStatus {
        self.monitor.wait_status()
    }
}

#[derive(Debug)]
struct ManagedHandle {
    monitor: ChildProcessMonitor,
    // Kept alive until the child has exited: dropping a pair stops its handler.
    endpoints: Vec<StreamEndpointPair>,
}

impl ManagedHandle {
    fn observe(&mut self, status: Option<ExitStatus>) -> Option<ExitStatus> {
        if status.is_some() {
            for endpoint in &self.endpoints {
                endpoint.signal_finish();
            }
        }
        status
    }
}

impl ProcessStatus for ManagedHandle {
    fn is_running(&mut self) -> bool {
        let running = self.monitor.is_running();
        if !running {
            for endpoint in &self.endpoints {
                endpoint.signal_finish();
            }
        }
        running
    }

    fn did_finish_running(&mut self) -> bool {
        let status = self.monitor.status();
        self.observe(status).is_some()
    }

    fn status(&mut self) -> Option<ExitStatus> {
        let status = self.monitor.status();
        self.observe(status)
    }

    fn wait(&mut self) -> ExitStatus {
        let status = self.monitor.wait_status();
        finish_endpoints(std::mem::take(&mut self.endpoints));
        status
    }
}

fn finish_endpoints(endpoints: Vec<StreamEndpointPair>) {
    for mut endpoint in endpoints {
        endpoint.finish();
    }
}

#[derive(Debug)]
enum HandleKind {
    Pid(PidHandle),
    Managed(ManagedHandle),
}

/// One spawned child process.
///
/// The exit status is recorded once and never re-queried, so waiting twice is cheap and
/// returns the same value. Dropping the handle neither kills nor reaps the child.
#[derive(Debug)]
pub struct ProcessHandle {
    kind: HandleKind,
}

impl ProcessHandle {
    pub(crate) fn passthru(pid: libc::pid_t) -> Self {
        Self {
            kind: HandleKind::Pid(PidHandle {
                monitor: ChildProcessMonitor::new(pid),
            }),
        }
    }

    pub(crate) fn managed(pid: libc::pid_t, endpoints: Vec<StreamEndpointPair>) -> Self {
        Self {
            kind: HandleKind::Managed(ManagedHandle {
                monitor: ChildProcessMonitor::new(pid),
                endpoints,
            }),
        }
    }

    /// The child's process id. Only meaningful while the child has not been reaped.
    pub fn pid(&self) -> libc::pid_t {
        self.monitor().pid()
    }

    /// `true` when the child inherited all of this process's standard streams.
    pub fn is_passthru(&self) -> bool {
        matches!(self.kind, HandleKind::Pid(_))
    }

    /// Waits for the child without blocking the async runtime.
    ///
    /// The blocking wait runs on tokio's blocking pool. If the returned future is dropped
    /// before it completes, the child is still reaped in the background and later waits on
    /// this handle report [`ExitStatus::Unavailable`].
    pub async fn wait_async(&mut self) -> ExitStatus {
        let mut monitor = self.monitor().clone();
        let endpoints = match &mut self.kind {
            HandleKind::Pid(_) => Vec::new(),
            HandleKind::Managed(handle) => std::mem::take(&mut handle.endpoints),
        };

        let joined = tokio::task::spawn_blocking(move || {
            let status = monitor.wait_status();
            finish_endpoints(endpoints);
            (monitor, status)
        })
        .await;

        match joined {
            Ok((monitor, status)) => {
                *self.monitor_mut() = monitor;
                status
            }
            Err(e) => {
                log::warn!("Background wait for pid {} failed: {}", self.pid(), e);
                self.wait()
            }
        }
    }

    fn monitor(&self) -> &ChildProcessMonitor {
        match &self.kind {
            HandleKind::Pid(handle) => &handle.monitor,
            HandleKind::Managed(handle) => &handle.monitor,
        }
    }

    fn monitor_mut(&mut self) -> &mut ChildProcessMonitor {
        match &mut self.kind {
            HandleKind::Pid(handle) => &mut handle.monitor,
            HandleKind::Managed(handle) => &mut handle.monitor,
        }
    }

    fn inner(&mut self) -> &mut dyn ProcessStatus {
        match &mut self.kind {
            HandleKind::Pid(handle) => handle as &mut dyn ProcessStatus,
            HandleKind::Managed(handle) => handle as &mut dyn ProcessStatus,
        }
    }
}

impl ProcessStatus for ProcessHandle {
    fn is_running(&mut self) -> bool {
        self.inner().is_running()
    }

    fn did_finish_running(&mut self) -> bool {
        self.inner().did_finish_running()
    }

    fn status(&mut self) -> Option<ExitStatus> {
        self.inner().status()
    }

    fn wait(&mut self) -> ExitStatus {
        self.inner().wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::spawn::{IoMode, Spawn};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_passthru_handle_reports_lifecycle() {
        let mut handle = Spawn::new("sleep").arg("1").run().expect("sleep should launch");
        assert!(handle.is_passthru());
        assert!(handle.pid() > 0);
        assert!(handle.is_running());
        assert!(!handle.did_finish_running());

        assert_eq!(handle.wait(), ExitStatus::Exited(0));
        assert!(!handle.is_running());
        assert!(handle.did_finish_running());
    }

    #[test]
    fn test_managed_handle_finishes_after_poll() {
        let mut handle = Spawn::new("true")
            .io_mode(IoMode::Pipe)
            .run()
            .expect("true should launch");
        assert!(!handle.is_passthru());

        thread::sleep(Duration::from_millis(500));
        assert!(handle.did_finish_running());
        assert_eq!(handle.status(), Some(ExitStatus::Exited(0)));
        assert_eq!(handle.wait(), ExitStatus::Exited(0));
    }

    #[tokio::test]
    async fn test_wait_async_caches_status() {
        let mut handle = Spawn::new("sh")
            .args(["-c", "exit 7"])
            .run()
            .expect("sh should launch");

        assert_eq!(handle.wait_async().await, ExitStatus::Exited(7));
        assert_eq!(handle.wait(), ExitStatus::Exited(7));
        assert_eq!(handle.wait_async().await, ExitStatus::Exited(7));
    }
}
