//! Output sinks receiving incremental command output.
//!
//! The aggregator pushes every decoded chunk of a handle in per-stream
//! order. A sink shared between executions sees pushes from several
//! handles concurrently, so implementations must be `Send + Sync` and
//! `push` must return promptly without waiting on the consumer.

use std::io::Write;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::info;

use super::result::{OutputChunk, OutputSource};
use crate::error::ShellExecError;
use crate::Result;

/// Consumer of incremental command output.
pub trait OutputSink: Send + Sync {
    /// Deliver one chunk. Errors are logged by the caller and never abort
    /// the execution.
    fn push(&self, chunk: &OutputChunk) -> Result<()>;

    /// Bring the output surface to the foreground.
    fn reveal(&self) -> Result<()> {
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn push(&self, _chunk: &OutputChunk) -> Result<()> {
        Ok(())
    }
}

/// Sink forwarding chunks into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutputChunk>,
}

impl ChannelSink {
    /// Create a sink and the receiver its chunks arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn push(&self, chunk: &OutputChunk) -> Result<()> {
        self.tx
            .send(chunk.clone())
            .map_err(|_| ShellExecError::Sink("receiver dropped".into()))
    }
}

/// Sink that logs complete lines through `tracing`.
///
/// Partial lines are buffered per stream until their newline arrives.
#[derive(Debug, Default)]
pub struct TracingSink {
    partial: Mutex<(String, String)>,
}

impl TracingSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for TracingSink {
    fn push(&self, chunk: &OutputChunk) -> Result<()> {
        let mut partial = self
            .partial
            .lock()
            .map_err(|_| ShellExecError::LockPoisoned)?;
        let buf = match chunk.source {
            OutputSource::Stdout => &mut partial.0,
            OutputSource::Stderr => &mut partial.1,
        };
        buf.push_str(&chunk.text);

        while let Some(pos) = buf.find('\n') {
            let line: String = buf.drain(..=pos).collect();
            info!(source = ?chunk.source, "{}", line.trim_end());
        }
        Ok(())
    }
}

/// Sink that mirrors output onto this process's stdout and stderr.
///
/// Writes and flushes synchronously on the calling task, so a stalled
/// terminal stalls the aggregator that owns the push. Meant for the
/// `shell-exec` binary, where the terminal is the only consumer; library
/// callers sharing a runtime should prefer [`ChannelSink`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn push(&self, chunk: &OutputChunk) -> Result<()> {
        match chunk.source {
            OutputSource::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk.text.as_bytes())?;
                out.flush()?;
            }
            OutputSource::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(chunk.text.as_bytes())?;
                err.flush()?;
            }
        }
        Ok(())
    }
}
