//! Error types for command_guard.
//!
//! Errors fall into four groups:
//! - [`ArgumentError`]: malformed input (empty executable, unbalanced quotes, ...)
//! - [`SubstitutionError`]: a `${name}` reference that cannot be expanded
//! - [`Violation`]: the command was rejected by the policy engine
//! - [`ExecError`]: the command passed every check but launching it failed
//!
//! [`CommandError`] unions all of them for the prepare-and-spawn flow.

use std::time::Duration;
use thiserror::Error;

/// Malformed input detected while parsing or configuring a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// The whole command line was blank
    #[error("command line cannot be empty")]
    EmptyCommandLine,

    /// The executable token was missing or blank
    #[error("executable cannot be empty")]
    EmptyExecutable,

    /// A quote was opened but never closed
    #[error("unbalanced quotes in {line:?}")]
    UnbalancedQuotes { line: String },

    /// An argument holds both quote characters and cannot be re-quoted
    #[error("cannot handle single and double quotes in the same argument: {value:?}")]
    MixedQuotes { value: String },

    /// No restriction set was supplied to the policy engine
    #[error("restrictions must not be absent")]
    MissingRestrictions,
}

/// Failure expanding a `${name}` reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    /// Strict mode and the name is not in the map
    #[error("no value found for ${{{name}}}")]
    Unresolved { name: String },

    /// The reference was not closed with `}`
    #[error("delimiter not found for ${{{name}")]
    MissingDelimiter { name: String },
}

/// Policy violation detected by the policy engine.
///
/// These errors indicate the command was rejected before any launch attempt.
/// Messages are safe to log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A shell `-c` payload packs more than one command
    #[error("multiple commands not allowed: {shell} -c payload has separator {separator:?} at byte {index}")]
    CommandChaining {
        shell: String,
        separator: char,
        index: usize,
    },

    /// The executable is on the banned list
    #[error("file inaccessible: banned executable {name}")]
    BannedExecutable { executable: String, name: String },

    /// An argument resolves to a sensitive system file
    #[error("file inaccessible: argument {argument:?} targets {sensitive}")]
    SensitiveFile { argument: String, sensitive: String },
}

/// Execution error during `spawn()`.
///
/// These errors indicate the command was valid but execution failed.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Nothing to run: the request was a blank command line
    #[error("empty command")]
    EmptyCommand,

    /// Process exceeded timeout and was killed
    #[error("process timed out after {elapsed:?} (limit: {limit:?})")]
    Timeout { limit: Duration, elapsed: Duration },

    /// Process exceeded stdout limit and was killed
    #[error("stdout limit exceeded: {limit} bytes")]
    StdoutLimitExceeded { limit: usize },

    /// Process exceeded stderr limit and was killed
    #[error("stderr limit exceeded: {limit} bytes")]
    StderrLimitExceeded { limit: usize },

    /// Failed to spawn the process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed { reason: String },
}

/// Combined error type for the parse, check and spawn flow.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    #[error(transparent)]
    Violation(#[from] Violation),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl CommandError {
    /// True when the command was rejected for security reasons rather than
    /// because it was malformed or failed to run.
    pub fn is_violation(&self) -> bool {
        matches!(self, CommandError::Violation(_))
    }

    /// The policy violation, if this is one.
    pub fn as_violation(&self) -> Option<&Violation> {
        match self {
            CommandError::Violation(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_distinguishable_from_argument_error() {
        let violation: CommandError = Violation::BannedExecutable {
            executable: "/usr/bin/curl".to_string(),
            name: "curl".to_string(),
        }
        .into();
        let argument: CommandError = ArgumentError::EmptyExecutable.into();

        assert!(violation.is_violation());
        assert!(!argument.is_violation());
        assert!(argument.as_violation().is_none());
    }

    #[test]
    fn test_substitution_messages_render_reference() {
        let err = SubstitutionError::Unresolved {
            name: "file".to_string(),
        };
        assert_eq!(err.to_string(), "no value found for ${file}");

        let err = SubstitutionError::MissingDelimiter {
            name: "file".to_string(),
        };
        assert_eq!(err.to_string(), "delimiter not found for ${file");
    }
}
