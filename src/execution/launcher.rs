//! Process launching.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::governor::TimeoutGuard;
use super::options::ExecutionOptions;
use super::result::OutputSource;
use super::state::TerminationState;
use super::stream::{AsyncStreamReader, CHUNK_CHANNEL_CAPACITY};
use crate::error::ShellExecError;
use crate::process::ProcessTree;
use crate::Result;

/// Exit code reported when the shell or program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the shell or program could not be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Exit code reported for any other spawn failure.
pub const EXIT_SPAWN_FAILED: i32 = 1;

/// One in-flight external command.
///
/// Created by [`launch`], optionally armed by
/// [`attach_timeout`](super::attach_timeout), then consumed by the
/// [`ResultAggregator`](super::ResultAggregator). Dropping a handle before
/// it is aggregated kills the direct child; on Windows it also kills the
/// job the command was put in.
#[derive(Debug)]
pub struct ExecutionHandle {
    pub(crate) pid: Option<u32>,
    pub(crate) tree: Option<ProcessTree>,
    pub(crate) command_line: String,
    pub(crate) started_at: Instant,
    pub(crate) deadline: Option<Instant>,
    pub(crate) state: Arc<watch::Sender<TerminationState>>,
    pub(crate) process: Process,
    pub(crate) governor: Option<TimeoutGuard>,
}

#[derive(Debug)]
pub(crate) enum Process {
    Running {
        child: Child,
        stdout: mpsc::Receiver<Vec<u8>>,
        stderr: mpsc::Receiver<Vec<u8>>,
    },
    SpawnFailed {
        exit_code: i32,
        message: String,
    },
}

impl ExecutionHandle {
    /// OS process id, or `None` if the spawn failed.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The command line that was launched.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// When the process was launched.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Deadline set by the timeout governor, if one is attached.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Current termination state.
    pub fn state(&self) -> TerminationState {
        *self.state.borrow()
    }

    /// Watch termination state changes.
    pub fn subscribe(&self) -> watch::Receiver<TerminationState> {
        self.state.subscribe()
    }

    /// Whether the spawn itself failed.
    pub fn spawn_failed(&self) -> bool {
        matches!(self.process, Process::SpawnFailed { .. })
    }
}

/// Launch `command_line` through the platform shell.
///
/// The child inherits this process's environment with `options.env`
/// layered on top. Must be called from within a tokio runtime.
///
/// Only an empty command line is an error. A spawn failure yields a handle
/// that is already `Exited` and carries a synthesized exit code and the
/// error text.
pub fn launch(command_line: &str, options: &ExecutionOptions) -> Result<ExecutionHandle> {
    if command_line.trim().is_empty() {
        return Err(ShellExecError::EmptyCommand);
    }

    let mut cmd = shell_command(command_line);
    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }
    cmd.envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started_at = Instant::now();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return Ok(spawn_failed(command_line, started_at, &e)),
    };

    let pid = child.id();
    debug!(?pid, command = command_line, "spawned process");
    let tree = pid.map(|pid| process_tree(pid, &child));

    let stdout = pipe_reader(child.stdout.take(), OutputSource::Stdout);
    let stderr = pipe_reader(child.stderr.take(), OutputSource::Stderr);
    let (state, _) = watch::channel(TerminationState::Running);

    Ok(ExecutionHandle {
        pid,
        tree,
        command_line: command_line.to_string(),
        started_at,
        deadline: None,
        state: Arc::new(state),
        process: Process::Running {
            child,
            stdout,
            stderr,
        },
        governor: None,
    })
}

fn pipe_reader<R>(pipe: Option<R>, source: OutputSource) -> mpsc::Receiver<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
    if let Some(pipe) = pipe {
        tokio::spawn(AsyncStreamReader::new(pipe, tx, source).run());
    }
    rx
}

fn spawn_failed(command_line: &str, started_at: Instant, err: &io::Error) -> ExecutionHandle {
    let exit_code = spawn_failure_code(err);
    warn!(command = command_line, exit_code, "failed to spawn process: {}", err);

    let (state, _) = watch::channel(TerminationState::Exited);
    ExecutionHandle {
        pid: None,
        tree: None,
        command_line: command_line.to_string(),
        started_at,
        deadline: None,
        state: Arc::new(state),
        process: Process::SpawnFailed {
            exit_code,
            message: format!("failed to spawn `{command_line}`: {err}\n"),
        },
        governor: None,
    }
}

fn spawn_failure_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => EXIT_NOT_FOUND,
        io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
        _ => EXIT_SPAWN_FAILED,
    }
}

#[cfg(not(windows))]
fn process_tree(pid: u32, _child: &Child) -> ProcessTree {
    ProcessTree::new(pid)
}

/// Track the child through a job object; fall back to `taskkill` by pid
/// when the job cannot be set up.
#[cfg(windows)]
fn process_tree(pid: u32, child: &Child) -> ProcessTree {
    use crate::process::job::JobObject;

    let Some(raw) = child.raw_handle() else {
        return ProcessTree::new(pid);
    };
    match JobObject::create().and_then(|job| job.assign(raw).map(|()| job)) {
        Ok(job) => ProcessTree::with_job(pid, job),
        Err(e) => {
            warn!(pid, "failed to put process in a job object: {}", e);
            ProcessTree::new(pid)
        }
    }
}

/// Build the shell invocation for the current platform.
///
/// POSIX: `/bin/sh -c <line>` leading a fresh process group, so the whole
/// tree can be signalled at once. Windows: `cmd.exe /C <line>` with the
/// line passed verbatim.
#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command_line).process_group(0);
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/C")
        .raw_arg(command_line)
        .creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(any(unix, windows)))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}
