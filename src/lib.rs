//! # shell-exec
//!
//! Async external process execution for tools that drive third-party
//! CLIs (`kubectl`, `flux`, `git`, ...).
//!
//! Every command runs through the same pipeline: launch through the
//! platform shell, stream output to a sink while it runs, enforce an
//! optional timeout that takes down the whole process tree, and report a
//! single [`ShellResult`] whatever happened.
//!
//! ## Features
//!
//! - **Uniform results**: non-zero exits, spawn failures and timeouts are
//!   all values, never errors
//! - **Streaming**: decoded output chunks reach an [`OutputSink`] in order
//!   while the process runs
//! - **Tree-wide timeouts**: graceful termination, a fixed grace window,
//!   then a force kill of every descendant
//! - **Concurrent**: each execution is independent; no global locks
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_exec::{ExecutionOptions, ShellExecutor, TracingSink};
//!
//! #[tokio::main]
//! async fn main() -> shell_exec::Result<()> {
//!     // Initialize logging
//!     shell_exec::logging::try_init().ok();
//!
//!     let executor = ShellExecutor::new().with_sink(TracingSink::new());
//!     let options = ExecutionOptions::new().timeout_secs(10).show_progress(true);
//!
//!     let result = executor.exec("echo hello", &options).await?;
//!     println!("exit code: {:?}", result.exit_code());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod platform;
pub mod process;

// Re-export commonly used types
pub use error::{Result, ShellExecError};
pub use execution::{
    exec_simple, exec_with_timeout, ChannelSink, CommandFormatter, ConsoleSink, ExecutionHandle,
    ExecutionOptions, NullSink, OutputChunk, OutputSink, OutputSource, Outcome, ShellExecutor,
    ShellResult, TerminationState, TracingSink,
};
pub use platform::{platform, Platform};
