//! Command execution engine.
//!
//! This module provides the process execution pipeline:
//! - Launching shell commands with environment overrides
//! - Streaming output to a sink while the command runs
//! - Two-stage timeouts that take down the whole process tree
//! - A uniform [`ShellResult`] for every outcome
//!
//! # Example
//!
//! ```no_run
//! use shell_exec::execution::{ExecutionOptions, ShellExecutor, TracingSink};
//!
//! # async fn run() -> shell_exec::Result<()> {
//! let executor = ShellExecutor::new().with_sink(TracingSink::new());
//! let options = ExecutionOptions::new()
//!     .env("KUBECONFIG", "/tmp/kubeconfig")
//!     .timeout_secs(30)
//!     .show_progress(true);
//!
//! let result = executor.exec("kubectl get pods", &options).await?;
//! if result.timed_out() {
//!     eprintln!("{}", result.stderr());
//! }
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod executor;
mod formatter;
mod governor;
mod launcher;
mod options;
mod result;
mod sink;
mod state;
mod stream;

pub use aggregator::{ResultAggregator, DRAIN_WINDOW};
pub use executor::{exec_simple, exec_with_timeout, ShellExecutor};
pub use formatter::{CommandFormatter, PassthroughFormatter, PlatformPrefixFormatter};
pub use governor::{attach_timeout, TimeoutGuard};
pub use launcher::{
    launch, ExecutionHandle, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND, EXIT_SPAWN_FAILED,
};
pub use options::{ExecutionOptions, TimeoutPolicy, GRACE_WINDOW};
pub use result::{OutputChunk, OutputSource, Outcome, ShellResult, TIMEOUT_MARKER};
pub use sink::{ChannelSink, ConsoleSink, NullSink, OutputSink, TracingSink};
pub use state::TerminationState;
pub use stream::{AsyncStreamReader, Utf8Decoder};
