//! Command execution request.

use crate::restrictions::{default_restrictions, RestrictionSet};
use std::collections::HashMap;
use std::path::PathBuf;

/// The command to run, as a shell-style line or a pre-split argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    /// A single shell-style string, tokenized before checking.
    Line(String),
    /// `argv[0]` is the executable, the rest are arguments.
    Argv(Vec<String>),
}

/// A proposed command execution request.
///
/// This struct represents what the caller wants to execute.
/// It must be checked by `PolicyEngine::prepare()` before execution.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// The command itself.
    pub command: CommandInput,

    /// Environment for the process.
    ///
    /// `None` inherits the parent environment. `Some` replaces it entirely.
    pub env: Option<HashMap<String, String>>,

    /// Working directory for the process.
    ///
    /// `None` inherits the parent's working directory.
    pub cwd: Option<PathBuf>,

    /// Checks to run. Defaults to [`default_restrictions`].
    ///
    /// `None` is rejected by the policy engine with
    /// `ArgumentError::MissingRestrictions`.
    pub restrictions: Option<RestrictionSet>,
}

impl CommandRequest {
    fn new(command: CommandInput) -> Self {
        Self {
            command,
            env: None,
            cwd: None,
            restrictions: Some(default_restrictions()),
        }
    }

    /// Request for a shell-style command line.
    pub fn line(line: impl Into<String>) -> Self {
        Self::new(CommandInput::Line(line.into()))
    }

    /// Request for a pre-split argv.
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandInput::Argv(argv.into_iter().map(Into::into).collect()))
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set environment variables, replacing the inherited environment.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Add a single environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the environment from `KEY=VALUE` entries.
    ///
    /// Entries without `=` are skipped.
    pub fn with_envp<I, S>(mut self, envp: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let env = self.env.get_or_insert_with(HashMap::new);
        for entry in envp {
            if let Some((key, value)) = entry.as_ref().split_once('=') {
                env.insert(key.to_string(), value.to_string());
            }
        }
        self
    }

    /// Set the restrictions to enforce.
    pub fn with_restrictions(mut self, restrictions: RestrictionSet) -> Self {
        self.restrictions = Some(restrictions);
        self
    }
}
