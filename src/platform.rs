//! Operating system family detection.

/// Operating system family the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Apple macOS.
    MacOs,
    /// Linux.
    Linux,
    /// Anything else.
    Unsupported,
}

impl Platform {
    /// Resolve a platform from a `std::env::consts::OS` style name.
    pub fn from_os_name(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Unsupported,
        }
    }

    /// Whether this is Windows.
    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Whether this is a POSIX family supported by the process launcher.
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::MacOs | Self::Linux)
    }
}

/// The platform of the running process.
pub fn platform() -> Platform {
    Platform::from_os_name(std::env::consts::OS)
}
