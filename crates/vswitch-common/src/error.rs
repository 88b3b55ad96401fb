//! Error types for provider operations.
//!
//! Errors fall in two classes that callers must be able to tell apart:
//! execution failures (the external command could not be spawned or exited
//! non-zero) and parse failures (the command ran but printed something we
//! could not make sense of). All errors implement `std::error::Error` via
//! `thiserror`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to execute a command (spawn error).
    #[error("Failed to execute command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Command returned non-zero exit code.
    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code, -1 when the process was killed by a signal.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Command output could not be parsed.
    #[error("Unexpected output from '{command}': {message}: {input:?}")]
    Parse {
        /// The query whose output was malformed.
        command: String,
        /// The offending fragment of output.
        input: String,
        /// What was wrong with it.
        message: String,
    },

    /// Configuration or resource declaration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read or deserialized.
    #[error("Failed to load {}: {message}", path.display())]
    ConfigFile {
        /// The file being loaded.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

impl ProviderError {
    /// Creates a parse error.
    pub fn parse(
        command: impl Into<String>,
        input: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            command: command.into(),
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration file error.
    pub fn config_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if an external command could not be run or exited non-zero.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            ProviderError::ShellExec { .. } | ProviderError::ShellCommandFailed { .. }
        )
    }

    /// Returns true if a command ran but its output was malformed.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ProviderError::Parse { .. })
    }

    /// Returns the exit code for a command that ran and failed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProviderError::ShellCommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_command_failed() {
        let err = ProviderError::ShellCommandFailed {
            command: "ovs-vsctl add-br br-ex".to_string(),
            exit_code: 1,
            output: "ovs-vsctl: cannot create a bridge named br-ex".to_string(),
        };
        assert!(err.to_string().contains("ovs-vsctl add-br br-ex"));
        assert!(err.to_string().contains("exit code 1"));
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ProviderError::parse(
            "ovs-vsctl br-get-external-id br0",
            "garbage",
            "missing '=' separator",
        );
        assert_eq!(
            err.to_string(),
            "Unexpected output from 'ovs-vsctl br-get-external-id br0': missing '=' separator: \"garbage\""
        );
    }

    #[test]
    fn test_invalid_config() {
        let err = ProviderError::invalid_config("name", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for name: must not be empty"
        );
    }

    #[test]
    fn test_error_classes_are_distinct() {
        let spawn = ProviderError::ShellExec {
            command: "ovs-vsctl br-exists br0".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(spawn.is_execution_failure());
        assert!(!spawn.is_parse_error());
        assert_eq!(spawn.exit_code(), None);

        let parse = ProviderError::parse("cmd", "x", "bad");
        assert!(parse.is_parse_error());
        assert!(!parse.is_execution_failure());
    }
}
