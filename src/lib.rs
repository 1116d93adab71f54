//! # command_guard
//!
//! Command-line hardening for code that must run semi-trusted commands.
//!
//! `command_guard` parses a shell-style command line (or a pre-split argv)
//! into an executable and arguments, then runs semantic checks before the
//! command reaches a process launcher:
//!
//! - **Chaining**: a shell's `-c` payload may not hold `;`, `&`, `|` or a
//!   newline outside quotes and comments.
//! - **Banned executables**: reverse-shell, download and package tools such as
//!   `nc`, `curl`, `wget`, `rpm` (opt-in).
//! - **Sensitive files**: arguments may not resolve to files such as
//!   `/etc/passwd` or `/etc/shadow`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use command_guard::{CommandRequest, PolicyEngine, Restriction, RestrictionSet};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PolicyEngine::default();
//!
//! // Default restrictions: chaining and sensitive files.
//! let output = engine
//!     .run_command(CommandRequest::line("ls -al '/tmp'"))
//!     .await?;
//! println!("stdout: {}", output.stdout_string());
//!
//! // Opt in to the banned-executable check.
//! let request = CommandRequest::line("wget http://example.com/")
//!     .with_restrictions(RestrictionSet::all());
//! assert!(engine.prepare(request).is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Limits
//!
//! The checks approximate shell semantics; they are not a shell grammar.
//! Paths that cannot be resolved are treated as "not a file" and pass, while
//! a denylist match always rejects.

mod canonical;
mod command_spec;
mod denylist;
mod error;
mod limits;
mod output;
mod policy;
mod prepared;
mod request;
mod restrictions;
mod separator;
mod substitution;
mod tokenizer;

// Public API
pub use canonical::{lexical_normalize, Canonical, Canonicalizer, FsCanonicalizer};
pub use command_spec::{quote_argument, Argument, CommandSpec};
pub use denylist::{Denylists, BANNED_EXECUTABLES, BINARY_DIRS, SENSITIVE_FILES, SHELLS};
pub use error::{ArgumentError, CommandError, ExecError, SubstitutionError, Violation};
pub use limits::{ResourceLimits, DEFAULT_MAX_STDERR, DEFAULT_MAX_STDOUT, DEFAULT_TIMEOUT};
pub use output::Output;
pub use policy::{PolicyEngine, PolicyEngineBuilder};
pub use prepared::PreparedCommand;
pub use request::{CommandInput, CommandRequest};
pub use restrictions::{default_restrictions, Restriction, RestrictionSet};
pub use separator::{find_command_separator, COMMAND_SEPARATORS};
pub use substitution::{
    substitute, to_platform_separators, SubstitutionMap, SubstitutionMode, SubstitutionValue,
};
pub use tokenizer::tokenize;
