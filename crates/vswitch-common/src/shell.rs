//! Command execution for the provider.
//!
//! Commands are run directly (no intermediate shell), so arguments never need
//! escaping on the way out. Quoting is only used to render a command line for
//! logs and error messages in a form that can be pasted back into a shell.
//!
//! Execution goes through the [`CommandRunner`] trait so callers can be
//! handed a fake switch in tests instead of spawning real binaries.
//!
//! # Example
//!
//! ```ignore
//! use vswitch_common::shell::{CommandLine, CommandRunner, SystemRunner, VSCTL_CMD};
//!
//! let runner = SystemRunner::new();
//! let cmd = CommandLine::new(VSCTL_CMD).arg("br-exists").arg("br-ex");
//! let result = runner.exec(&cmd)?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::process::{Command, Stdio};

use crate::error::{ProviderError, ProviderResult};

/// Default `ovs-vsctl` binary, resolved through `PATH`.
pub const VSCTL_CMD: &str = "ovs-vsctl";

/// Default `ip` binary, resolved through `PATH`.
pub const IP_CMD: &str = "ip";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Arguments made only of these characters are printed without quotes.
static SHELL_SAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// The string is wrapped in double quotes and any character with special
/// meaning inside double quotes (`$`, `` ` ``, `"`, `\`, newline) is escaped.
///
/// # Example
///
/// ```
/// use vswitch_common::shell::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// assert_eq!(shellquote("with\"quote"), "\"with\\\"quote\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Renders a single argument, quoting it only when the shell would need it.
pub fn display_arg(s: &str) -> String {
    if SHELL_SAFE_RE.is_match(s) {
        s.to_string()
    } else {
        shellquote(s)
    }
}

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Binary name or path.
    pub program: String,
    /// Arguments, passed to the program verbatim.
    pub args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", display_arg(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", display_arg(arg))?;
        }
        Ok(())
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The trimmed stdout output.
    pub stdout: String,
    /// The trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Creates a successful result carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed result.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs external commands on behalf of the provider.
///
/// Implementations block until the command has exited. A non-zero exit is
/// reported through [`ExecResult`], not as an error; only a failure to run
/// the command at all is an `Err`.
pub trait CommandRunner: Send + Sync {
    /// Executes a command and returns its exit status and output.
    fn exec(&self, cmd: &CommandLine) -> ProviderResult<ExecResult>;

    /// Executes a command and returns stdout, failing on non-zero exit.
    fn exec_or_throw(&self, cmd: &CommandLine) -> ProviderResult<String> {
        let result = self.exec(cmd)?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(ProviderError::ShellCommandFailed {
                command: cmd.to_string(),
                exit_code: result.exit_code,
                output: result.combined_output(),
            })
        }
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new system runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn exec(&self, cmd: &CommandLine) -> ProviderResult<ExecResult> {
        tracing::debug!(command = %cmd, "Executing command");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ProviderError::ShellExec {
                command: cmd.to_string(),
                source: e,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let result = ExecResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };

        if result.success() {
            tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
        } else {
            tracing::warn!(
                command = %cmd,
                exit_code = exit_code,
                stderr = %result.stderr,
                "Command failed"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shellquote_simple() {
        assert_eq!(shellquote("simple"), "\"simple\"");
        assert_eq!(shellquote("br-ex"), "\"br-ex\"");
        assert_eq!(shellquote(""), "\"\"");
    }

    #[test]
    fn test_shellquote_special_chars() {
        assert_eq!(shellquote("$HOME"), "\"\\$HOME\"");
        assert_eq!(shellquote("`whoami`"), "\"\\`whoami\\`\"");
        assert_eq!(shellquote("say \"hello\""), "\"say \\\"hello\\\"\"");
        assert_eq!(shellquote("path\\to"), "\"path\\\\to\"");
        assert_eq!(shellquote("line1\nline2"), "\"line1\\\nline2\"");
    }

    #[test]
    fn test_command_line_display() {
        let cmd = CommandLine::new(VSCTL_CMD)
            .args(["set", "Bridge", "br-ex"])
            .arg("other-config:mac-table-size=2048");
        assert_eq!(
            cmd.to_string(),
            "ovs-vsctl set Bridge br-ex other-config:mac-table-size=2048"
        );
    }

    #[test]
    fn test_command_line_display_quotes_unsafe_args() {
        let cmd = CommandLine::new(VSCTL_CMD)
            .args(["br-set-external-id", "br0", "owner"])
            .arg("net team; rm -rf /");
        assert_eq!(
            cmd.to_string(),
            "ovs-vsctl br-set-external-id br0 owner \"net team; rm -rf /\""
        );
        assert_eq!(display_arg(""), "\"\"");
    }

    #[test]
    fn test_exec_result_combined() {
        let result = ExecResult {
            exit_code: 0,
            stdout: "stdout".to_string(),
            stderr: "stderr".to_string(),
        };
        assert!(result.success());
        assert_eq!(result.combined_output(), "stdout\nstderr");

        let failed = ExecResult::failed(2, "no bridge named br0");
        assert!(!failed.success());
        assert_eq!(failed.combined_output(), "no bridge named br0");
    }

    #[test]
    fn test_system_runner_echo() {
        let runner = SystemRunner::new();
        let result = runner
            .exec(&CommandLine::new("echo").arg("hello"))
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "hello");
    }

    #[test]
    fn test_system_runner_nonzero_exit() {
        let runner = SystemRunner::new();
        let result = runner
            .exec(&CommandLine::new("sh").args(["-c", "exit 42"]))
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.exit_code, 42);
    }

    #[test]
    fn test_exec_or_throw_failure() {
        let runner = SystemRunner::new();
        match runner.exec_or_throw(&CommandLine::new("sh").args(["-c", "exit 1"])) {
            Err(ProviderError::ShellCommandFailed { exit_code, .. }) => {
                assert_eq!(exit_code, 1);
            }
            other => panic!("Expected ShellCommandFailed error, got {:?}", other),
        }
    }

    #[test]
    fn test_system_runner_missing_binary() {
        let runner = SystemRunner::new();
        let err = runner
            .exec(&CommandLine::new("/nonexistent/ovs-vsctl").arg("br-exists"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::ShellExec { .. }));
    }
}
