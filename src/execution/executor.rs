//! Command execution pipeline.

use std::sync::Arc;

use super::aggregator::ResultAggregator;
use super::formatter::{CommandFormatter, PassthroughFormatter};
use super::governor::attach_timeout;
use super::launcher::launch;
use super::options::ExecutionOptions;
use super::result::ShellResult;
use super::sink::{NullSink, OutputSink};
use crate::error::ShellExecError;
use crate::Result;

/// Runs command lines end to end: format, launch, arm the timeout,
/// aggregate.
///
/// Cheap to clone; clones share the formatter and sink. Every call to
/// [`exec`](Self::exec) is independent, so one executor can serve many
/// concurrent callers.
#[derive(Clone)]
pub struct ShellExecutor {
    formatter: Arc<dyn CommandFormatter>,
    sink: Arc<dyn OutputSink>,
}

impl ShellExecutor {
    /// Create an executor with a pass-through formatter and a null sink.
    pub fn new() -> Self {
        Self {
            formatter: Arc::new(PassthroughFormatter),
            sink: Arc::new(NullSink),
        }
    }

    /// Use a different command formatter.
    pub fn with_formatter(mut self, formatter: impl CommandFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Push output to `sink` when options ask for progress.
    pub fn with_sink(mut self, sink: impl OutputSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Push output to a sink shared with other owners.
    pub fn with_shared_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Execute `command_line` and wait for its result.
    ///
    /// Returns `Err` only for an empty command line. Spawn failures,
    /// non-zero exits and timeouts are all reported through the
    /// [`ShellResult`].
    pub async fn exec(&self, command_line: &str, options: &ExecutionOptions) -> Result<ShellResult> {
        if command_line.trim().is_empty() {
            return Err(ShellExecError::EmptyCommand);
        }

        let formatted = self.formatter.format(command_line);
        let mut handle = launch(&formatted, options)?;
        attach_timeout(&mut handle, options.timeout_secs);

        let result = ResultAggregator::new(self.sink.as_ref())
            .show_progress(options.show_progress)
            .reveal_output(options.reveal_output)
            .collect(handle)
            .await;
        Ok(result)
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShellExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellExecutor").finish_non_exhaustive()
    }
}

/// Simple one-shot command execution.
pub async fn exec_simple(command_line: &str) -> Result<ShellResult> {
    ShellExecutor::new()
        .exec(command_line, &ExecutionOptions::new())
        .await
}

/// Execute a command with timeout.
pub async fn exec_with_timeout(command_line: &str, timeout_secs: u64) -> Result<ShellResult> {
    ShellExecutor::new()
        .exec(command_line, &ExecutionOptions::new().timeout_secs(timeout_secs))
        .await
}
