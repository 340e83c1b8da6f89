//! Per-call execution options and the timeout policy derived from them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between the graceful termination signal and the force kill.
pub const GRACE_WINDOW: Duration = Duration::from_secs(2);

/// Options for launching one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Working directory for the child (inherits ours if unset).
    pub working_dir: Option<PathBuf>,
    /// Environment variables layered over the inherited environment.
    pub env: HashMap<String, String>,
    /// Timeout in seconds; `None` or `0` disables it.
    pub timeout_secs: Option<u64>,
    /// Push output chunks to the sink while the command runs.
    pub show_progress: bool,
    /// Ask the sink to reveal itself before output starts.
    pub reveal_output: bool,
}

impl ExecutionOptions {
    /// Create options with no overrides and no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variable overrides.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Set the timeout in whole seconds (0 disables it).
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set whether output is streamed to the sink.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Set whether the sink is revealed before streaming.
    pub fn reveal_output(mut self, reveal: bool) -> Self {
        self.reveal_output = reveal;
        self
    }

    /// The timeout policy for these options, if a timeout is enabled.
    pub fn timeout_policy(&self) -> Option<TimeoutPolicy> {
        TimeoutPolicy::from_secs(self.timeout_secs)
    }
}

/// Deadline configuration for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Time allowed before graceful termination starts.
    pub timeout: Duration,
    /// Time allowed between graceful termination and force kill.
    pub grace: Duration,
}

impl TimeoutPolicy {
    /// Build a policy from a seconds value; `None` and `0` mean no timeout.
    pub fn from_secs(secs: Option<u64>) -> Option<Self> {
        match secs {
            Some(secs) if secs > 0 => Some(Self {
                timeout: Duration::from_secs(secs),
                grace: GRACE_WINDOW,
            }),
            _ => None,
        }
    }

    /// Upper bound on how long the governor may take after launch.
    pub fn worst_case(&self) -> Duration {
        self.timeout.saturating_add(self.grace)
    }
}
