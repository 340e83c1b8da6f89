//! Timeout governor.
//!
//! One background task per armed handle. It sleeps until the deadline
//! (or until the handle exits), then terminates the process tree in two
//! stages: graceful termination, a fixed grace window, and a force kill of
//! whatever survived. It only ever sends OS signals; output buffers stay
//! with the aggregator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::launcher::ExecutionHandle;
use super::options::TimeoutPolicy;
use super::state::TerminationState;
use crate::process::ProcessTree;

/// How often the tree is probed during the grace window.
const GRACE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The governor task attached to a handle.
#[derive(Debug)]
pub struct TimeoutGuard {
    task: JoinHandle<()>,
    policy: TimeoutPolicy,
}

impl TimeoutGuard {
    /// The policy this guard enforces.
    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    /// Wait for the termination sequence to run to completion.
    pub(crate) async fn settle(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!("timeout governor task failed: {}", e);
            }
        }
    }

    /// Stop the governor; used once the handle exited on its own.
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}

/// Arm `handle` with a deadline of `timeout_secs` from now.
///
/// No-op when the timeout is `None` or `0`, or when the handle has no
/// running process. Re-arming replaces the previous deadline. A timeout too
/// large to add to the clock behaves like no timeout.
pub fn attach_timeout(handle: &mut ExecutionHandle, timeout_secs: Option<u64>) {
    let Some(policy) = TimeoutPolicy::from_secs(timeout_secs) else {
        return;
    };
    let Some(tree) = handle.tree.clone() else {
        return;
    };
    let pid = tree.pid();
    if handle.state().is_terminal() {
        return;
    }

    if let Some(previous) = handle.governor.take() {
        previous.cancel();
        handle.deadline = None;
    }

    let Some(deadline) = Instant::now().checked_add(policy.timeout) else {
        debug!(pid, "timeout too far in the future to represent, not armed");
        return;
    };
    handle.deadline = Some(deadline.into_std());
    let task = tokio::spawn(govern(tree, Arc::clone(&handle.state), deadline, policy.grace));
    handle.governor = Some(TimeoutGuard { task, policy });
    debug!(pid, timeout_secs = policy.timeout.as_secs(), "timeout attached");
}

async fn govern(
    tree: ProcessTree,
    state: Arc<watch::Sender<TerminationState>>,
    deadline: Instant,
    grace: Duration,
) {
    let pid = tree.pid();
    let mut exited = state.subscribe();
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => {}
        _ = exited.wait_for(TerminationState::is_terminal) => {
            trace!(pid, "process exited before deadline");
            return;
        }
    }

    if !state.send_if_modified(|s| s.transition_to(TerminationState::GracefullyTerminating).is_ok()) {
        return;
    }
    warn!(pid, "deadline expired, terminating process tree");
    tree.terminate().await;

    let grace_deadline = Instant::now() + grace;
    loop {
        if !tree.alive().await {
            debug!(pid, "process tree ended within grace window");
            return;
        }
        let now = Instant::now();
        if now >= grace_deadline {
            break;
        }
        tokio::time::sleep(GRACE_POLL_INTERVAL.min(grace_deadline - now)).await;
    }

    if state.send_if_modified(|s| s.transition_to(TerminationState::ForceKilled).is_ok()) {
        warn!(pid, "process tree survived grace window, force killing");
        tree.kill().await;
    }
}
