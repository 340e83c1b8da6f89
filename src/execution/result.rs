//! Execution result types.

use serde::{Deserialize, Serialize};

/// Marker appended to stderr when the timeout governor ended a command.
pub const TIMEOUT_MARKER: &str = "[shell-exec] command timed out";

/// Terminal result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellResult {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Coarse classification of a [`ShellResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exited with code 0.
    Success,
    /// Exited with a non-zero code (including synthesized spawn failures).
    CommandFailure,
    /// Ended by the timeout governor.
    Timeout,
}

impl ShellResult {
    pub(crate) fn exited(code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code: Some(code),
            stdout,
            stderr,
        }
    }

    #[cfg(test)]
    pub(crate) fn timed_out_after(timeout_secs: u64, stdout: String, mut stderr: String) -> Self {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&timeout_annotation(timeout_secs));
        stderr.push('\n');
        Self::timed_out_with(stdout, stderr)
    }

    /// Timed-out result whose stderr already carries the marker.
    pub(crate) fn timed_out_with(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: None,
            stdout,
            stderr,
        }
    }

    /// Exit code, or `None` when the command timed out.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Everything the command wrote to stdout.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Everything the command wrote to stderr, plus the timeout marker if
    /// it timed out.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Check if command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Check if command failed (non-zero exit code or timeout).
    pub fn failed(&self) -> bool {
        !self.success()
    }

    /// Check if the command was ended by the timeout governor.
    pub fn timed_out(&self) -> bool {
        self.exit_code.is_none()
    }

    /// Classify this result.
    pub fn outcome(&self) -> Outcome {
        match self.exit_code {
            None => Outcome::Timeout,
            Some(0) => Outcome::Success,
            Some(_) => Outcome::CommandFailure,
        }
    }

    /// Get stdout as string, trimmed.
    pub fn output_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stdout lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Split into `(exit_code, stdout, stderr)`.
    pub fn into_parts(self) -> (Option<i32>, String, String) {
        (self.exit_code, self.stdout, self.stderr)
    }
}

pub(crate) fn timeout_annotation(timeout_secs: u64) -> String {
    format!("{TIMEOUT_MARKER} after {timeout_secs}s")
}

/// Streaming output chunk from execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Decoded text. Not necessarily line aligned.
    pub text: String,
    /// Stream source.
    pub source: OutputSource,
}

/// Source of output data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputChunk {
    /// Create a new output chunk.
    pub fn new(text: impl Into<String>, source: OutputSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }

    /// Create a stdout chunk.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(text, OutputSource::Stdout)
    }

    /// Create a stderr chunk.
    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(text, OutputSource::Stderr)
    }
}
