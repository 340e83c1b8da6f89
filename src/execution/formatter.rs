//! Command line formatting ahead of launch.

use crate::platform::{platform, Platform};

/// Pure transform from a caller's command line to the one actually run.
pub trait CommandFormatter: Send + Sync {
    /// Produce the final command line.
    fn format(&self, command_line: &str) -> String;
}

/// Formatter that returns the command line unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFormatter;

impl CommandFormatter for PassthroughFormatter {
    fn format(&self, command_line: &str) -> String {
        command_line.to_string()
    }
}

/// Formatter that prefixes command lines with a wrapper (for example
/// `wsl` to route Windows invocations through a compatibility layer) when
/// running on a target platform.
#[derive(Debug, Clone)]
pub struct PlatformPrefixFormatter {
    prefix: String,
    target: Platform,
    current: Platform,
}

impl PlatformPrefixFormatter {
    /// Prefix commands with `prefix` when running on `target`.
    pub fn new(prefix: impl Into<String>, target: Platform) -> Self {
        Self {
            prefix: prefix.into(),
            target,
            current: platform(),
        }
    }

    /// Override the detected platform.
    pub fn with_current_platform(mut self, current: Platform) -> Self {
        self.current = current;
        self
    }
}

impl CommandFormatter for PlatformPrefixFormatter {
    fn format(&self, command_line: &str) -> String {
        let prefix = self.prefix.trim();
        if self.current != self.target || prefix.is_empty() {
            return command_line.to_string();
        }
        format!("{} {}", prefix, command_line.trim_start())
    }
}
