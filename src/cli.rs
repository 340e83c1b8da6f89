//! Command-line interface for shell-exec.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

/// Command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Command words; joined with spaces into the command line.
    pub command: Vec<String>,
    /// Timeout in seconds (overrides config).
    pub timeout_secs: Option<u64>,
    /// Working directory for the command.
    pub working_dir: Option<PathBuf>,
    /// Environment overrides, in the order given.
    pub env: Vec<(String, String)>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Do not stream output while the command runs.
    pub quiet: bool,
    /// Reveal the output surface before streaming.
    pub reveal: bool,
    /// Print the final result as JSON.
    pub json: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The command line to run.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// Everything from the first positional argument (or after `--`) on is
/// taken as the command, including words that look like options.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('C') | Long("cwd") => {
                result.working_dir = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                result.env.push(parse_env_pair(&value)?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('q') | Long("quiet") => {
                result.quiet = true;
            }
            Long("reveal") => {
                result.reveal = true;
            }
            Long("json") => {
                result.json = true;
            }
            Value(val) => {
                result.command.push(val.string()?);
                for rest in parser.raw_args()? {
                    result.command.push(
                        rest.into_string()
                            .map_err(|raw| ArgsError::NonUnicode(raw.to_string_lossy().into()))?,
                    );
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn parse_env_pair(value: &str) -> Result<(String, String), ArgsError> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(ArgsError::InvalidValue("env", value.to_string())),
    }
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-exec {version}
Run a shell command with streamed output and a process-tree timeout

USAGE:
    shell-exec [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -t, --timeout <SECS>    Timeout in seconds, 0 disables [default: 0]
    -C, --cwd <DIR>         Working directory for the command
    -e, --env <KEY=VALUE>   Environment override (repeatable)
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -q, --quiet             Do not stream output while running
        --reveal            Reveal the output surface before streaming
        --json              Print the result as JSON when done
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_EXEC_TIMEOUT      Timeout in seconds (overrides config)
    SHELL_EXEC_LOG_LEVEL    Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXIT STATUS:
    The command's own exit code, 124 if it timed out, 2 on usage errors.

EXAMPLES:
    # Run with a 30 second timeout
    shell-exec -t 30 kubectl get pods -A

    # Point a CLI at a different kubeconfig
    shell-exec -e KUBECONFIG=/tmp/dev.yaml -- flux get kustomizations

    # Capture the result as JSON
    shell-exec -q --json git status --short
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-exec {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Error, Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    #[error("{0}")]
    Lexopt(#[from] lexopt::Error),
    /// Invalid argument value.
    #[error("invalid value for --{0}: '{1}'")]
    InvalidValue(&'static str, String),
    /// Command word that is not valid Unicode.
    #[error("command argument is not valid unicode: '{0}'")]
    NonUnicode(String),
    /// No command given.
    #[error("no command given")]
    MissingCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("shell-exec")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.command.is_empty());
        assert!(result.timeout_secs.is_none());
        assert!(!result.quiet);
        assert!(!result.json);
    }

    #[test]
    fn test_command_words() {
        let result = parse_args_from(args(&["kubectl", "get", "pods"])).unwrap();
        assert_eq!(result.command_line(), "kubectl get pods");
    }

    #[test]
    fn test_options_after_command_belong_to_command() {
        let result = parse_args_from(args(&["-t", "5", "ls", "-la", "--json"])).unwrap();
        assert_eq!(result.timeout_secs, Some(5));
        assert_eq!(result.command_line(), "ls -la --json");
        assert!(!result.json);
    }

    #[test]
    fn test_double_dash() {
        let result = parse_args_from(args(&["--", "-weird", "arg"])).unwrap();
        assert_eq!(result.command_line(), "-weird arg");
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--timeout",
            "10",
            "--cwd",
            "/srv",
            "--quiet",
            "--reveal",
            "--json",
            "true",
        ]))
        .unwrap();
        assert_eq!(result.timeout_secs, Some(10));
        assert_eq!(result.working_dir, Some(PathBuf::from("/srv")));
        assert!(result.quiet);
        assert!(result.reveal);
        assert!(result.json);
    }

    #[test]
    fn test_env_pairs() {
        let result = parse_args_from(args(&["-e", "A=1", "--env", "B=x=y", "env"])).unwrap();
        assert_eq!(
            result.env,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
    }

    #[test]
    fn test_env_pair_with_empty_value() {
        let result = parse_args_from(args(&["-e", "EMPTY=", "env"])).unwrap();
        assert_eq!(result.env, vec![("EMPTY".to_string(), String::new())]);
    }

    #[test]
    fn test_invalid_env_pair() {
        assert!(parse_args_from(args(&["-e", "NOEQUALS", "env"])).is_err());
        assert!(parse_args_from(args(&["-e", "=value", "env"])).is_err());
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(parse_args_from(args(&["-t", "soon", "true"])).is_err());
        assert!(parse_args_from(args(&["-t", "-1", "true"])).is_err());
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/shell-exec.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/shell-exec.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug", "true"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }
}
