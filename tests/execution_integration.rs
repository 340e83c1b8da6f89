//! Execution integration tests.
//!
//! These tests run real shell commands through the full pipeline. Most use
//! POSIX shell syntax and are compiled on unix only.

#![cfg(unix)]

use std::time::{Duration, Instant};

use shell_exec::execution::{
    attach_timeout, launch, ChannelSink, ExecutionOptions, OutputSource, ResultAggregator,
    ShellExecutor, TerminationState, GRACE_WINDOW, TIMEOUT_MARKER,
};
use shell_exec::process::{kill_tree, terminate_tree};
use shell_exec::{NullSink, Outcome};

/// Whether `pid` is a live (non-zombie) process.
fn process_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .map(|state| state != 'Z' && state != 'X')
                .unwrap_or(false),
            Err(_) => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let out = std::process::Command::new("ps")
            .args(["-o", "stat=", "-p", &pid.to_string()])
            .output()
            .unwrap();
        let stat = String::from_utf8_lossy(&out.stdout);
        let stat = stat.trim();
        !stat.is_empty() && !stat.starts_with('Z')
    }
}

async fn wait_until_gone(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if !process_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !process_running(pid)
}

fn first_line_pid(stdout: &str) -> u32 {
    stdout
        .lines()
        .next()
        .and_then(|line| line.trim().parse().ok())
        .expect("command should print a pid on its first line")
}

// ============================================================================
// Normal completion
// ============================================================================

#[tokio::test]
async fn test_echo_hello() {
    let result = ShellExecutor::new()
        .exec("echo hello", &ExecutionOptions::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), "hello\n");
    assert_eq!(result.stderr(), "");
    assert_eq!(result.outcome(), Outcome::Success);
}

#[tokio::test]
async fn test_non_zero_exit_preserves_code_and_stderr() {
    let result = ShellExecutor::new()
        .exec("echo oops >&2; exit 3", &ExecutionOptions::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(3));
    assert_eq!(result.stderr(), "oops\n");
    assert_eq!(result.outcome(), Outcome::CommandFailure);
}

#[tokio::test]
async fn test_empty_output() {
    let result = ShellExecutor::new()
        .exec("true", &ExecutionOptions::new())
        .await
        .unwrap();

    assert!(result.success());
    assert!(result.stdout().is_empty());
    assert!(result.stderr().is_empty());
}

#[tokio::test]
async fn test_missing_executable() {
    let result = ShellExecutor::new()
        .exec("definitely-not-a-real-binary-9f3c", &ExecutionOptions::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(127));
    assert!(!result.stderr().is_empty());
    assert!(!result.timed_out());
}

#[tokio::test]
async fn test_missing_working_dir_reported_as_result() {
    let options = ExecutionOptions::new().working_dir("/definitely/not/a/real/dir");
    let result = ShellExecutor::new()
        .exec("echo hi", &options)
        .await
        .unwrap();

    assert!(result.failed());
    assert!(result.exit_code().is_some());
    assert!(result.stderr().contains("failed to spawn"));
}

// ============================================================================
// Environment and working directory
// ============================================================================

#[tokio::test]
async fn test_env_override_is_visible() {
    let options = ExecutionOptions::new().env("SHELL_EXEC_TEST_VAR", "layered value");
    let result = ShellExecutor::new()
        .exec("printf %s \"$SHELL_EXEC_TEST_VAR\"", &options)
        .await
        .unwrap();

    assert_eq!(result.stdout(), "layered value");
}

#[tokio::test]
async fn test_environment_is_inherited() {
    let Some(path) = std::env::var_os("PATH") else {
        return;
    };
    let result = ShellExecutor::new()
        .exec("printf %s \"$PATH\"", &ExecutionOptions::new())
        .await
        .unwrap();

    assert_eq!(result.stdout(), path.to_string_lossy());
}

#[tokio::test]
async fn test_override_wins_over_inherited() {
    let options = ExecutionOptions::new().env("HOME", "/override/home");
    let result = ShellExecutor::new()
        .exec("printf %s \"$HOME\"", &options)
        .await
        .unwrap();

    assert_eq!(result.stdout(), "/override/home");
}

#[tokio::test]
async fn test_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();

    let options = ExecutionOptions::new().working_dir(dir.path());
    let result = ShellExecutor::new()
        .exec("pwd -P", &options)
        .await
        .unwrap();

    assert_eq!(result.output_trimmed(), expected.to_string_lossy());
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_streamed_stdout_matches_result() {
    let (sink, mut rx) = ChannelSink::new();
    let executor = ShellExecutor::new().with_sink(sink);
    let options = ExecutionOptions::new().show_progress(true);

    let result = executor
        .exec(
            "for i in 1 2 3 4 5; do echo line $i; echo err $i >&2; done",
            &options,
        )
        .await
        .unwrap();

    let mut stdout = String::new();
    let mut stderr = String::new();
    while let Ok(chunk) = rx.try_recv() {
        match chunk.source {
            OutputSource::Stdout => stdout.push_str(&chunk.text),
            OutputSource::Stderr => stderr.push_str(&chunk.text),
        }
    }

    assert_eq!(stdout, result.stdout());
    assert_eq!(stderr, result.stderr());
    assert!(stdout.starts_with("line 1\n"));
    assert!(stdout.ends_with("line 5\n"));
}

#[tokio::test]
async fn test_chunks_arrive_while_running() {
    let (sink, mut rx) = ChannelSink::new();
    let executor = ShellExecutor::new().with_sink(sink);
    let options = ExecutionOptions::new().show_progress(true);

    let task = tokio::spawn(async move { executor.exec("echo first; sleep 1; echo second", &options).await });

    let first = tokio::time::timeout(Duration::from_millis(800), rx.recv())
        .await
        .expect("first chunk should arrive before the command finishes")
        .unwrap();
    assert_eq!(first.text, "first\n");
    assert!(!task.is_finished());

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.stdout(), "first\nsecond\n");
}

#[tokio::test]
async fn test_large_output_is_complete() {
    const SIZE: usize = 1_000_000;
    let (sink, mut rx) = ChannelSink::new();
    let executor = ShellExecutor::new().with_sink(sink);
    let options = ExecutionOptions::new().show_progress(true);

    let result = executor
        .exec(
            &format!("head -c {SIZE} /dev/zero | tr '\\0' 'a'"),
            &options,
        )
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.stdout().len(), SIZE);
    assert!(result.stdout().bytes().all(|b| b == b'a'));

    let mut streamed = String::new();
    let mut chunks = 0;
    while let Ok(chunk) = rx.try_recv() {
        streamed.push_str(&chunk.text);
        chunks += 1;
    }
    assert!(chunks > 1);
    assert_eq!(streamed, result.stdout());
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_timeout_sleep() {
    let start = Instant::now();
    let result = ShellExecutor::new()
        .exec("sleep 10", &ExecutionOptions::new().timeout_secs(1))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result.exit_code(), None);
    assert!(result.timed_out());
    assert!(result.stderr().contains(TIMEOUT_MARKER));
    assert!(elapsed >= Duration::from_secs(1));
    assert!(
        elapsed < Duration::from_secs(1) + GRACE_WINDOW + Duration::from_secs(1),
        "took {elapsed:?}"
    );
}

#[tokio::test]
async fn test_timeout_keeps_partial_output() {
    let result = ShellExecutor::new()
        .exec(
            "echo started; echo warming up >&2; sleep 10",
            &ExecutionOptions::new().timeout_secs(1),
        )
        .await
        .unwrap();

    assert!(result.timed_out());
    assert_eq!(result.stdout(), "started\n");
    assert!(result.stderr().starts_with("warming up\n"));
    assert!(result.stderr().contains(TIMEOUT_MARKER));
}

#[tokio::test]
async fn test_timeout_kills_forked_child() {
    let result = ShellExecutor::new()
        .exec(
            "sleep 30 & echo $!; wait",
            &ExecutionOptions::new().timeout_secs(1),
        )
        .await
        .unwrap();

    assert!(result.timed_out());
    let child = first_line_pid(result.stdout());
    assert!(
        wait_until_gone(child, Duration::from_millis(500)).await,
        "forked child {child} outlived the timeout"
    );
}

#[tokio::test]
async fn test_timeout_force_kills_term_ignoring_tree() {
    let start = Instant::now();
    let result = ShellExecutor::new()
        .exec(
            "trap '' TERM; sleep 30 & echo $!; wait",
            &ExecutionOptions::new().timeout_secs(1),
        )
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(result.timed_out());
    assert!(elapsed >= Duration::from_secs(1) + GRACE_WINDOW);
    assert!(
        elapsed < Duration::from_secs(1) + GRACE_WINDOW + Duration::from_secs(2),
        "took {elapsed:?}"
    );

    let child = first_line_pid(result.stdout());
    assert!(wait_until_gone(child, Duration::from_millis(500)).await);
}

#[tokio::test]
async fn test_fast_command_with_timeout_is_not_timed_out() {
    let start = Instant::now();
    let result = ShellExecutor::new()
        .exec("echo quick", &ExecutionOptions::new().timeout_secs(5))
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_zero_timeout_means_no_timeout() {
    let result = ShellExecutor::new()
        .exec("sleep 1; echo done", &ExecutionOptions::new().timeout_secs(0))
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), "done\n");
}

#[tokio::test]
async fn test_state_sequence_on_timeout() {
    let mut handle = launch("sleep 10", &ExecutionOptions::new()).unwrap();
    let states = handle.subscribe();
    attach_timeout(&mut handle, Some(1));

    let result = ResultAggregator::new(&NullSink).collect(handle).await;
    assert!(result.timed_out());
    assert_eq!(*states.borrow(), TerminationState::Exited);
}

#[tokio::test]
async fn test_huge_timeout_behaves_like_none() {
    let result = ShellExecutor::new()
        .exec("echo hi", &ExecutionOptions::new().timeout_secs(u64::MAX))
        .await
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), "hi\n");
}

#[tokio::test]
async fn test_timeout_marker_on_unterminated_stderr_is_streamed() {
    let (sink, mut rx) = ChannelSink::new();
    let executor = ShellExecutor::new().with_sink(sink);
    let options = ExecutionOptions::new().timeout_secs(1).show_progress(true);

    let result = executor
        .exec("printf partial >&2; sleep 10", &options)
        .await
        .unwrap();

    let mut stderr = String::new();
    while let Ok(chunk) = rx.try_recv() {
        if chunk.source == OutputSource::Stderr {
            stderr.push_str(&chunk.text);
        }
    }

    assert!(result.timed_out());
    assert_eq!(result.stderr(), format!("partial\n{TIMEOUT_MARKER} after 1s\n"));
    assert_eq!(stderr, result.stderr());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_result_not_held_by_escaped_descendant() {
    let start = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(8),
        ShellExecutor::new().exec(
            "setsid sleep 15 & sleep 30",
            &ExecutionOptions::new().timeout_secs(1),
        ),
    )
    .await
    .expect("result held back by a process outside the group")
    .unwrap();
    let elapsed = start.elapsed();

    assert!(result.timed_out());
    assert!(
        elapsed < Duration::from_secs(1) + GRACE_WINDOW + Duration::from_secs(1),
        "took {elapsed:?}"
    );
}

// ============================================================================
// Idempotence and concurrency
// ============================================================================

#[tokio::test]
async fn test_signals_after_exit_are_harmless() {
    let handle = launch("echo done", &ExecutionOptions::new()).unwrap();
    let pid = handle.pid().unwrap();
    let result = ResultAggregator::new(&NullSink).collect(handle).await;

    terminate_tree(pid).await;
    terminate_tree(pid).await;
    kill_tree(pid).await;

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), "done\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executions_are_independent() {
    let executor = ShellExecutor::new();
    let start = Instant::now();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let executor = executor.clone();
            tokio::spawn(async move {
                executor
                    .exec(&format!("sleep 1; echo {i}"), &ExecutionOptions::new())
                    .await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.stdout(), format!("{i}\n"));
    }
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_does_not_affect_other_execution() {
    let executor = ShellExecutor::new();

    let slow = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor
                .exec("sleep 10", &ExecutionOptions::new().timeout_secs(1))
                .await
        })
    };
    let fine = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor
                .exec("sleep 2; echo survived", &ExecutionOptions::new())
                .await
        })
    };

    let slow = slow.await.unwrap().unwrap();
    let fine = fine.await.unwrap().unwrap();
    assert!(slow.timed_out());
    assert_eq!(fine.exit_code(), Some(0));
    assert_eq!(fine.stdout(), "survived\n");
}
