//! shell-exec binary entry point.

use std::process::ExitCode;

use shell_exec::cli::{self, ArgsError};
use shell_exec::config::Config;
use shell_exec::{logging, ConsoleSink, ShellExecutor};
use tracing::{debug, error};

/// Exit status when the command timed out (same as coreutils `timeout`).
const EXIT_TIMED_OUT: u8 = 124;
/// Exit status for usage and configuration errors.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'shell-exec --help' for more information.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let _ = logging::init_with_filter(config.log_filter());

    if args.command.is_empty() {
        eprintln!("error: {}", ArgsError::MissingCommand);
        eprintln!("Try 'shell-exec --help' for more information.");
        return ExitCode::from(EXIT_USAGE);
    }

    let command_line = args.command_line();
    let options = config.to_options(&args);
    debug!(command = %command_line, ?options, "running command");

    let executor = ShellExecutor::new().with_sink(ConsoleSink);
    let result = match executor.exec(&command_line, &options).await {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("failed to serialize result: {}", e),
        }
    } else if !options.show_progress {
        print!("{}", result.stdout());
        eprint!("{}", result.stderr());
    }

    match result.exit_code() {
        None => ExitCode::from(EXIT_TIMED_OUT),
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    }
}
