//! Result aggregation.
//!
//! Drains both output streams and the exit notification of a single
//! handle, pushes decoded chunks to the sink as they arrive and produces
//! the one [`ShellResult`] for the handle.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tracing::{debug, warn};

use super::launcher::{ExecutionHandle, Process, EXIT_SPAWN_FAILED};
use super::result::{timeout_annotation, OutputChunk, OutputSource, ShellResult};
use super::sink::OutputSink;
use super::state::TerminationState;
use super::stream::Utf8Decoder;

/// How long output already in flight is still collected once a timed-out
/// tree has been taken down.
pub const DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// Consumes an [`ExecutionHandle`] into its [`ShellResult`].
pub struct ResultAggregator<'a> {
    sink: &'a dyn OutputSink,
    show_progress: bool,
    reveal_output: bool,
}

impl<'a> ResultAggregator<'a> {
    /// Create an aggregator pushing to `sink`. Streaming is off until
    /// [`show_progress`](Self::show_progress) enables it.
    pub fn new(sink: &'a dyn OutputSink) -> Self {
        Self {
            sink,
            show_progress: false,
            reveal_output: false,
        }
    }

    /// Stream chunks to the sink while the command runs.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Reveal the sink once before streaming starts.
    pub fn reveal_output(mut self, reveal: bool) -> Self {
        self.reveal_output = reveal;
        self
    }

    /// Run the handle to completion and build its result.
    ///
    /// Completes once the child exited and both pipes are closed. If the
    /// timeout governor started terminating the tree, this instead waits
    /// for its sequence to finish, drains whatever output is already
    /// buffered for at most [`DRAIN_WINDOW`] and returns, so the tree is
    /// gone when the result is returned and a process that escaped the
    /// group cannot hold the result back by keeping a pipe open.
    pub async fn collect(&self, handle: ExecutionHandle) -> ShellResult {
        let ExecutionHandle {
            pid,
            started_at,
            state,
            process,
            governor,
            ..
        } = handle;

        let mut port = SinkPort::new(self.sink, self.show_progress);
        if self.reveal_output {
            port.reveal();
        }

        let (mut child, mut stdout_rx, mut stderr_rx) = match process {
            Process::SpawnFailed { exit_code, message } => {
                port.push(OutputChunk::stderr(message.clone()));
                return ShellResult::exited(exit_code, String::new(), message);
            }
            Process::Running {
                child,
                stdout,
                stderr,
            } => (child, stdout, stderr),
        };

        let mut stdout = StreamBuffer::new(OutputSource::Stdout);
        let mut stderr = StreamBuffer::new(OutputSource::Stderr);
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut status: Option<io::Result<ExitStatus>> = None;
        let mut states = state.subscribe();

        loop {
            if status.is_some() {
                if !stdout_open && !stderr_open {
                    break;
                }
                if states.borrow_and_update().is_terminating() {
                    break;
                }
            }
            tokio::select! {
                chunk = stdout_rx.recv(), if stdout_open => match chunk {
                    Some(bytes) => stdout.absorb(&bytes, &mut port),
                    None => stdout_open = false,
                },
                chunk = stderr_rx.recv(), if stderr_open => match chunk {
                    Some(bytes) => stderr.absorb(&bytes, &mut port),
                    None => stderr_open = false,
                },
                exit = child.wait(), if status.is_none() => {
                    debug!(?pid, "process exited: {:?}", exit);
                    status = Some(exit);
                }
                _ = states.changed(), if status.is_some() => {}
            }
        }

        let exited_normally = state.send_if_modified(|s| {
            *s == TerminationState::Running && s.transition_to(TerminationState::Exited).is_ok()
        });

        let result = if exited_normally {
            if let Some(guard) = governor {
                guard.cancel();
            }
            stdout.finish(&mut port);
            stderr.finish(&mut port);
            let (code, note) = exit_code(status);
            if let Some(note) = note {
                stderr.push_note(&note, &mut port);
            }
            ShellResult::exited(code, stdout.text, stderr.text)
        } else {
            let timeout_secs = governor
                .as_ref()
                .map(|g| g.policy().timeout.as_secs())
                .unwrap_or_default();
            if let Some(guard) = governor {
                guard.settle().await;
            }

            let drained = tokio::time::timeout(DRAIN_WINDOW, async {
                while stdout_open || stderr_open {
                    tokio::select! {
                        chunk = stdout_rx.recv(), if stdout_open => match chunk {
                            Some(bytes) => stdout.absorb(&bytes, &mut port),
                            None => stdout_open = false,
                        },
                        chunk = stderr_rx.recv(), if stderr_open => match chunk {
                            Some(bytes) => stderr.absorb(&bytes, &mut port),
                            None => stderr_open = false,
                        },
                    }
                }
            })
            .await;
            if drained.is_err() {
                debug!(?pid, "output pipes still open after termination, detaching readers");
            }
            drop(stdout_rx);
            drop(stderr_rx);

            state.send_if_modified(|s| s.transition_to(TerminationState::Exited).is_ok());
            warn!(?pid, timeout_secs, "command timed out");
            stdout.finish(&mut port);
            stderr.finish(&mut port);
            stderr.push_note(&timeout_annotation(timeout_secs), &mut port);
            ShellResult::timed_out_with(stdout.text, stderr.text)
        };

        debug!(
            ?pid,
            exit_code = ?result.exit_code(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "execution finished"
        );
        result
    }
}

/// Accumulated text of one stream. Owned exclusively by the aggregator.
struct StreamBuffer {
    source: OutputSource,
    decoder: Utf8Decoder,
    text: String,
}

impl StreamBuffer {
    fn new(source: OutputSource) -> Self {
        Self {
            source,
            decoder: Utf8Decoder::new(),
            text: String::new(),
        }
    }

    fn absorb(&mut self, bytes: &[u8], port: &mut SinkPort<'_>) {
        let decoded = self.decoder.decode(bytes);
        self.append(decoded, port);
    }

    fn finish(&mut self, port: &mut SinkPort<'_>) {
        let tail = self.decoder.finish();
        self.append(tail, port);
    }

    fn push_note(&mut self, note: &str, port: &mut SinkPort<'_>) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.append("\n".to_string(), port);
        }
        self.append(format!("{note}\n"), port);
    }

    fn append(&mut self, decoded: String, port: &mut SinkPort<'_>) {
        if decoded.is_empty() {
            return;
        }
        self.text.push_str(&decoded);
        port.push(OutputChunk::new(decoded, self.source));
    }
}

/// Sink wrapper that swallows delivery failures.
struct SinkPort<'a> {
    sink: &'a dyn OutputSink,
    enabled: bool,
    failures: usize,
}

impl<'a> SinkPort<'a> {
    fn new(sink: &'a dyn OutputSink, enabled: bool) -> Self {
        Self {
            sink,
            enabled,
            failures: 0,
        }
    }

    fn reveal(&mut self) {
        if let Err(e) = self.sink.reveal() {
            warn!("failed to reveal output sink: {}", e);
        }
    }

    fn push(&mut self, chunk: OutputChunk) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.sink.push(&chunk) {
            self.failures += 1;
            if self.failures == 1 {
                warn!("output sink delivery failed: {}", e);
            } else {
                debug!(failures = self.failures, "output sink delivery failed: {}", e);
            }
        }
    }
}

/// Map the child's exit status to a code, plus a note for stderr when the
/// status could not be read.
fn exit_code(status: Option<io::Result<ExitStatus>>) -> (i32, Option<String>) {
    match status {
        Some(Ok(status)) => (code_of(status), None),
        Some(Err(e)) => (
            EXIT_SPAWN_FAILED,
            Some(format!("failed to wait for process: {e}")),
        ),
        None => (EXIT_SPAWN_FAILED, Some("process status unavailable".into())),
    }
}

#[cfg(unix)]
fn code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(EXIT_SPAWN_FAILED)
}

#[cfg(not(unix))]
fn code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(EXIT_SPAWN_FAILED)
}
