#[cfg(windows)]
use std::sync::Arc;

use tracing::{debug, trace};

#[cfg(windows)]
use super::job::JobObject;

/// Ask the process tree rooted at `pid` to terminate (`SIGTERM` to the
/// process group on POSIX, `taskkill /T` on Windows).
pub async fn terminate_tree(pid: u32) {
    debug!(pid, "sending graceful termination to process tree");
    imp::terminate(pid).await;
}

/// Forcefully kill the process tree rooted at `pid` (`SIGKILL` to the
/// process group on POSIX, `taskkill /F /T` on Windows).
pub async fn kill_tree(pid: u32) {
    debug!(pid, "force killing process tree");
    imp::kill(pid).await;
}

/// Whether any member of the tree rooted at `pid` is still alive.
pub async fn tree_alive(pid: u32) -> bool {
    let alive = imp::alive(pid).await;
    trace!(pid, alive, "probed process tree");
    alive
}

#[cfg(unix)]
mod imp {
    use std::io;

    pub(super) async fn terminate(pid: u32) {
        let _ = signal_group(pid, libc::SIGTERM);
    }

    pub(super) async fn kill(pid: u32) {
        let _ = signal_group(pid, libc::SIGKILL);
    }

    pub(super) async fn alive(pid: u32) -> bool {
        match signal_group(pid, 0) {
            Ok(()) => true,
            // The group exists but belongs to someone else.
            Err(e) => e.raw_os_error() == Some(libc::EPERM),
        }
    }

    fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
        let pgid = match libc::pid_t::try_from(pid) {
            Ok(pgid) if pgid > 1 => pgid,
            _ => return Err(io::Error::from(io::ErrorKind::InvalidInput)),
        };

        // SAFETY: killpg takes plain integers and touches no memory owned by
        // this process. `pgid > 1` rules out the caller's own group (0) and
        // init.
        let rc = unsafe { libc::killpg(pgid, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::process::Stdio;

    use tokio::process::Command;

    pub(super) async fn terminate(pid: u32) {
        taskkill(pid, false).await;
    }

    pub(super) async fn kill(pid: u32) {
        taskkill(pid, true).await;
    }

    pub(super) async fn alive(pid: u32) -> bool {
        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\"")),
            Err(_) => false,
        }
    }

    async fn taskkill(pid: u32, force: bool) {
        let mut cmd = Command::new("taskkill");
        if force {
            cmd.arg("/F");
        }
        cmd.args(["/T", "/PID", &pid.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Exit status 128 means the pid is already gone.
        let _ = cmd.status().await;
    }
}

#[cfg(not(any(unix, windows)))]
mod imp {
    pub(super) async fn terminate(_pid: u32) {}

    pub(super) async fn kill(_pid: u32) {}

    pub(super) async fn alive(_pid: u32) -> bool {
        false
    }
}

/// A launched process tree, as seen by the timeout governor.
///
/// On POSIX this is the process group led by `pid`. On Windows the tree is
/// also tracked through a job object when one could be set up at launch,
/// which keeps descendants reachable after the root has exited.
#[derive(Debug, Clone)]
pub struct ProcessTree {
    pid: u32,
    #[cfg(windows)]
    job: Option<Arc<JobObject>>,
}

impl ProcessTree {
    /// Track the tree rooted at `pid` by pid alone.
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            #[cfg(windows)]
            job: None,
        }
    }

    #[cfg(windows)]
    pub(crate) fn with_job(pid: u32, job: JobObject) -> Self {
        Self {
            pid,
            job: Some(Arc::new(job)),
        }
    }

    /// Pid of the tree's root process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Ask every member of the tree to terminate.
    pub async fn terminate(&self) {
        terminate_tree(self.pid).await;
    }

    /// Forcefully kill every member of the tree.
    pub async fn kill(&self) {
        #[cfg(windows)]
        if let Some(job) = &self.job {
            if let Err(e) = job.terminate() {
                debug!(pid = self.pid, "failed to terminate job object: {}", e);
            }
        }
        kill_tree(self.pid).await;
    }

    /// Whether any member of the tree is still alive.
    pub async fn alive(&self) -> bool {
        #[cfg(windows)]
        if let Some(job) = &self.job {
            match job.active_processes() {
                Ok(active) => {
                    trace!(pid = self.pid, active, "probed job object");
                    return active > 0;
                }
                Err(e) => debug!(pid = self.pid, "failed to query job object: {}", e),
            }
        }
        tree_alive(self.pid).await
    }
}
