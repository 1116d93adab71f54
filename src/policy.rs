//! Command policy engine.
//!
//! The main entry point for command_guard. `PolicyEngine` checks a parsed
//! command against a set of restrictions and, for requests, produces the only
//! type that can launch a process.

use crate::canonical::{Canonical, Canonicalizer, FsCanonicalizer};
use crate::command_spec::CommandSpec;
use crate::denylist::Denylists;
use crate::error::{ArgumentError, CommandError, Violation};
use crate::limits::ResourceLimits;
use crate::output::Output;
use crate::prepared::PreparedCommand;
use crate::request::{CommandInput, CommandRequest};
use crate::restrictions::{Restriction, RestrictionSet};
use crate::separator::find_command_separator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Checks commands against denylists before they are launched.
///
/// Engines are cheap to clone and safe to share across threads; the tables
/// are immutable.
///
/// Create using `PolicyEngine::builder()` or `PolicyEngine::default()`.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    /// Shell, banned-executable and sensitive-file tables.
    denylists: Arc<Denylists>,

    /// Resolves executables and arguments for comparison.
    canonicalizer: Arc<dyn Canonicalizer>,

    /// Resource limits handed to prepared commands.
    limits: ResourceLimits,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        PolicyEngineBuilder::new().build()
    }
}

impl PolicyEngine {
    /// Create a new engine builder.
    pub fn builder() -> PolicyEngineBuilder {
        PolicyEngineBuilder::new()
    }

    /// The tables this engine checks against.
    pub fn denylists(&self) -> &Denylists {
        &self.denylists
    }

    /// Run the checks named in `restrictions` against `spec`.
    ///
    /// Checks run in order: chaining, banned executables, sensitive files.
    /// On success `spec` is handed back untouched.
    ///
    /// # Errors
    ///
    /// - `ArgumentError::MissingRestrictions` if `restrictions` is `None`
    /// - `SubstitutionError` if a `${name}` reference cannot be expanded
    /// - `Violation` if a check fails
    pub fn check(
        &self,
        spec: CommandSpec,
        restrictions: Option<&RestrictionSet>,
    ) -> Result<CommandSpec, CommandError> {
        self.check_in(spec, restrictions, None)
    }

    /// Like [`PolicyEngine::check`], resolving relative paths against `cwd`
    /// instead of the current process's working directory.
    ///
    /// Pass the directory the command will run in.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyEngine::check`].
    pub fn check_in(
        &self,
        spec: CommandSpec,
        restrictions: Option<&RestrictionSet>,
        cwd: Option<&Path>,
    ) -> Result<CommandSpec, CommandError> {
        let restrictions = restrictions.ok_or(ArgumentError::MissingRestrictions)?;

        if restrictions.contains(Restriction::PreventChaining) {
            self.check_chaining(&spec, cwd)?;
        }

        if restrictions.contains(Restriction::PreventBannedExecutables) {
            self.check_banned_executable(&spec, cwd)?;
        }

        if restrictions.contains(Restriction::PreventSensitiveFileArguments) {
            self.check_sensitive_arguments(&spec, cwd)?;
        }

        Ok(spec)
    }

    /// Parse and check a request and prepare it for execution.
    ///
    /// This is the ONLY way to create a `PreparedCommand`. A blank command
    /// line skips every check and yields a command that fails to spawn with
    /// `ExecError::EmptyCommand`.
    ///
    /// # Errors
    ///
    /// Returns the first parse error or violation found.
    pub fn prepare(&self, request: CommandRequest) -> Result<PreparedCommand, CommandError> {
        let CommandRequest {
            command,
            env,
            cwd,
            restrictions,
        } = request;

        let (program, argv) = match command {
            CommandInput::Line(line) if line.trim().is_empty() => {
                tracing::debug!("blank command line passed through unchecked");
                (None, Vec::new())
            }
            CommandInput::Line(line) => {
                let spec =
                    self.check_in(CommandSpec::parse(&line)?, restrictions.as_ref(), cwd.as_deref())?;
                (
                    Some(PathBuf::from(spec.executable()?)),
                    spec.expanded_arguments()?,
                )
            }
            CommandInput::Argv(mut argv) => {
                self.check_in(
                    CommandSpec::from_argv(&argv)?,
                    restrictions.as_ref(),
                    cwd.as_deref(),
                )?;
                // Launch with the argv exactly as given.
                let program = PathBuf::from(argv.remove(0));
                (Some(program), argv)
            }
        };

        Ok(PreparedCommand {
            program,
            argv,
            env,
            cwd,
            limits: self.limits,
        })
    }

    /// Prepare a request and spawn it.
    ///
    /// # Errors
    ///
    /// Any error from [`PolicyEngine::prepare`] or `PreparedCommand::spawn`.
    pub async fn run_command(&self, request: CommandRequest) -> Result<Output, CommandError> {
        let prepared = self.prepare(request)?;
        Ok(prepared.spawn().await?)
    }

    /// Canonicalize `path`, anchoring a relative one at `cwd` when given.
    fn resolve(&self, path: &Path, cwd: Option<&Path>) -> Canonical {
        match cwd {
            Some(cwd) if path.is_relative() && !path.as_os_str().is_empty() => {
                self.canonicalizer.canonicalize(&cwd.join(path))
            }
            _ => self.canonicalizer.canonicalize(path),
        }
    }

    fn check_chaining(&self, spec: &CommandSpec, cwd: Option<&Path>) -> Result<(), CommandError> {
        let executable = spec.executable()?;
        if !self.is_shell(Path::new(&executable), cwd) {
            return Ok(());
        }

        let arguments = spec.expanded_arguments()?;
        let Some(payload) = shell_payload(&arguments) else {
            return Ok(());
        };
        let payload = strip_wrapping_double_quotes(payload.trim());

        if let Some(index) = find_command_separator(payload) {
            let separator = payload[index..].chars().next().unwrap_or(';');
            tracing::warn!(
                restriction = %Restriction::PreventChaining,
                shell = %executable,
                index,
                "command chaining rejected"
            );
            return Err(Violation::CommandChaining {
                shell: executable,
                separator,
                index,
            }
            .into());
        }

        Ok(())
    }

    /// A shell by name, or a `*sh` binary living in a known binary directory.
    fn is_shell(&self, executable: &Path, cwd: Option<&Path>) -> bool {
        let Some(name) = executable.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if self.denylists.is_shell_name(name) {
            return true;
        }

        if !name.ends_with("sh") {
            return false;
        }

        let Some(parent) = executable.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return false;
        };
        let Canonical::Resolved(parent) = self.resolve(parent, cwd) else {
            return false;
        };

        self.denylists.known_binary_dirs().iter().any(|dir| {
            *dir == parent || self.canonicalizer.canonicalize(dir).path() == Some(parent.as_path())
        })
    }

    fn check_banned_executable(
        &self,
        spec: &CommandSpec,
        cwd: Option<&Path>,
    ) -> Result<(), CommandError> {
        let executable = spec.executable()?;
        let path = Path::new(&executable);

        let canonical = self.resolve(path, cwd);
        if canonical == Canonical::Unresolvable {
            tracing::debug!(executable = %executable, "executable unresolvable, checking literal name only");
        }

        let names = [canonical.path(), Some(path)]
            .into_iter()
            .flatten()
            .filter_map(|p| p.file_name()?.to_str())
            .map(str::trim);

        for name in names {
            if self.denylists.is_banned(name) {
                tracing::warn!(
                    restriction = %Restriction::PreventBannedExecutables,
                    executable = %executable,
                    name,
                    "banned executable rejected"
                );
                return Err(Violation::BannedExecutable {
                    executable: executable.clone(),
                    name: name.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    fn check_sensitive_arguments(
        &self,
        spec: &CommandSpec,
        cwd: Option<&Path>,
    ) -> Result<(), CommandError> {
        for argument in spec.expanded_arguments()? {
            // Unresolvable arguments are not files.
            let Canonical::Resolved(canonical) = self.resolve(Path::new(&argument), cwd) else {
                continue;
            };

            if let Some(sensitive) = self.denylists.sensitive_match(&canonical) {
                tracing::warn!(
                    restriction = %Restriction::PreventSensitiveFileArguments,
                    argument = %argument,
                    sensitive = %sensitive.display(),
                    "sensitive file argument rejected"
                );
                return Err(Violation::SensitiveFile {
                    argument,
                    sensitive: sensitive.display().to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// The command string a shell runs for `-c` (or a short-flag cluster holding
/// `c`, such as `-ec`): the first operand after the flag. Option words in
/// between are skipped, as is the option name taken by `-o`/`+o`. `--` or `-`
/// ends the options.
fn shell_payload(arguments: &[String]) -> Option<&str> {
    let position = arguments.iter().position(|arg| is_command_flag(arg))?;
    let mut rest = arguments[position + 1..].iter();
    if takes_option_name(&arguments[position]) {
        rest.next();
    }

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--" | "-" => return rest.next().map(String::as_str),
            option if is_option_word(option) => {
                if takes_option_name(option) {
                    rest.next();
                }
            }
            operand => return Some(operand),
        }
    }
    None
}

fn is_option_word(arg: &str) -> bool {
    arg.len() > 1 && (arg.starts_with('-') || arg.starts_with('+'))
}

/// `-o name`, `+O name` and clusters ending in either, e.g. `-eo pipefail`.
fn takes_option_name(arg: &str) -> bool {
    !arg.starts_with("--") && is_option_word(arg) && (arg.ends_with('o') || arg.ends_with('O'))
}

fn is_command_flag(arg: &str) -> bool {
    match arg.strip_prefix('-') {
        Some(flags) if !flags.is_empty() && !flags.starts_with('-') => {
            flags.chars().all(|c| c.is_ascii_alphabetic()) && flags.contains('c')
        }
        _ => false,
    }
}

/// Strip one layer of double quotes when they wrap the whole payload and
/// nothing inside is double-quoted.
fn strip_wrapping_double_quotes(payload: &str) -> &str {
    payload
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .unwrap_or(payload)
}

/// Builder for `PolicyEngine`.
#[derive(Debug, Clone)]
pub struct PolicyEngineBuilder {
    /// Tables to check against.
    denylists: Arc<Denylists>,

    /// Path resolver.
    canonicalizer: Arc<dyn Canonicalizer>,

    /// Resource limits.
    limits: ResourceLimits,
}

impl PolicyEngineBuilder {
    /// Create a new builder with the standard tables and the filesystem
    /// canonicalizer.
    pub fn new() -> Self {
        Self {
            denylists: Denylists::standard(),
            canonicalizer: Arc::new(FsCanonicalizer),
            limits: ResourceLimits::default(),
        }
    }

    /// Set the denylist tables.
    pub fn denylists(mut self, denylists: impl Into<Arc<Denylists>>) -> Self {
        self.denylists = denylists.into();
        self
    }

    /// Set the canonicalizer.
    pub fn canonicalizer(mut self, canonicalizer: impl Canonicalizer + 'static) -> Self {
        self.canonicalizer = Arc::new(canonicalizer);
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.limits = self.limits.with_timeout(timeout);
        self
    }

    /// Set maximum stdout bytes.
    pub fn max_stdout(mut self, max: usize) -> Self {
        self.limits = self.limits.with_max_stdout(max);
        self
    }

    /// Set maximum stderr bytes.
    pub fn max_stderr(mut self, max: usize) -> Self {
        self.limits = self.limits.with_max_stderr(max);
        self
    }

    /// Set resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the engine.
    pub fn build(self) -> PolicyEngine {
        PolicyEngine {
            denylists: self.denylists,
            canonicalizer: self.canonicalizer,
            limits: self.limits,
        }
    }
}

impl Default for PolicyEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restrictions::default_restrictions;
    use std::collections::HashMap;

    /// Resolves from a fixed table and leaves everything else unresolvable.
    #[derive(Debug, Default)]
    struct TableCanonicalizer(HashMap<PathBuf, PathBuf>);

    impl TableCanonicalizer {
        fn with(mut self, from: &str, to: &str) -> Self {
            self.0.insert(PathBuf::from(from), PathBuf::from(to));
            self
        }
    }

    impl Canonicalizer for TableCanonicalizer {
        fn canonicalize(&self, path: &Path) -> Canonical {
            match self.0.get(path) {
                Some(resolved) => Canonical::Resolved(resolved.clone()),
                None => Canonical::Unresolvable,
            }
        }
    }

    fn only(restriction: Restriction) -> RestrictionSet {
        RestrictionSet::from([restriction])
    }

    fn check_line(line: &str, restrictions: &RestrictionSet) -> Result<CommandSpec, CommandError> {
        PolicyEngine::default().check(CommandSpec::parse(line).unwrap(), Some(restrictions))
    }

    fn check_argv(argv: &[&str], restrictions: &RestrictionSet) -> Result<CommandSpec, CommandError> {
        PolicyEngine::default().check(CommandSpec::from_argv(argv).unwrap(), Some(restrictions))
    }

    #[test]
    fn test_missing_restrictions_rejected() {
        let spec = CommandSpec::parse("ls").unwrap();
        let result = PolicyEngine::default().check(spec, None);
        assert!(matches!(
            result,
            Err(CommandError::Argument(ArgumentError::MissingRestrictions))
        ));
    }

    #[test]
    fn test_check_returns_spec_untouched() {
        let spec = CommandSpec::parse("ls -al '2nd arg'").unwrap();
        let checked = PolicyEngine::default()
            .check(spec.clone(), Some(&default_restrictions()))
            .unwrap();
        assert_eq!(checked, spec);
    }

    #[test]
    fn test_chaining_found_is_rejected() {
        let result = check_argv(
            &["/bin/sh", "-c", "ls \"foo\" && cat \"/etc/hosts\""],
            &only(Restriction::PreventChaining),
        );
        assert!(matches!(
            result,
            Err(CommandError::Violation(Violation::CommandChaining { separator: '&', .. }))
        ));
    }

    #[test]
    fn test_chaining_not_found_is_allowed() {
        let result = check_argv(
            &["/bin/sh", "-c", "ls \"foo\" \"/etc/hosts\""],
            &only(Restriction::PreventChaining),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_quoted_separator_is_allowed() {
        let result = check_argv(
            &["bash", "-c", "echo 'a; b' 'c | d'"],
            &only(Restriction::PreventChaining),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_shell_is_not_scanned() {
        let result = check_argv(&["echo", "-c", "a; b"], &only(Restriction::PreventChaining));
        assert!(result.is_ok());
    }

    #[test]
    fn test_shell_without_command_flag_is_not_scanned() {
        let result = check_line("/bin/sh thing-1.sh", &only(Restriction::PreventChaining));
        assert!(result.is_ok());
        let result = check_argv(&["bash", "-c"], &only(Restriction::PreventChaining));
        assert!(result.is_ok());
    }

    #[test]
    fn test_combined_short_flags_are_scanned() {
        let result = check_argv(&["bash", "-ec", "ls; id"], &only(Restriction::PreventChaining));
        assert!(result.is_err());
        let result = check_argv(&["bash", "--rcfile", "ls; id"], &only(Restriction::PreventChaining));
        assert!(result.is_ok());
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_payload_skips_options_before_operand() {
        assert_eq!(shell_payload(&args(&["-c", "ls; id"])), Some("ls; id"));
        assert_eq!(shell_payload(&args(&["-c", "--", "ls; id"])), Some("ls; id"));
        assert_eq!(shell_payload(&args(&["-c", "-", "ls; id"])), Some("ls; id"));
        assert_eq!(shell_payload(&args(&["-c", "-x", "+e", "ls; id"])), Some("ls; id"));
        assert_eq!(
            shell_payload(&args(&["-c", "-o", "pipefail", "ls | id"])),
            Some("ls | id")
        );
        assert_eq!(
            shell_payload(&args(&["-co", "pipefail", "ls | id"])),
            Some("ls | id")
        );
        assert_eq!(shell_payload(&args(&["-c", "--"])), None);
        assert_eq!(shell_payload(&args(&["-x", "script.sh"])), None);
    }

    #[test]
    fn test_relative_argument_resolved_against_cwd() {
        let engine = PolicyEngine::builder()
            .canonicalizer(TableCanonicalizer::default().with("/work/secret", "/etc/shadow"))
            .build();
        let restrictions = only(Restriction::PreventSensitiveFileArguments);

        let spec = CommandSpec::parse("cat secret").unwrap();
        assert!(engine.check(spec.clone(), Some(&restrictions)).is_ok());

        let result = engine.check_in(spec, Some(&restrictions), Some(Path::new("/work")));
        assert!(matches!(
            result,
            Err(CommandError::Violation(Violation::SensitiveFile { .. }))
        ));
    }

    #[test]
    fn test_wrapping_double_quotes_stripped() {
        assert_eq!(strip_wrapping_double_quotes("\"ls; id\""), "ls; id");
        assert_eq!(
            strip_wrapping_double_quotes("\"ls\"; rm \"x\""),
            "\"ls\"; rm \"x\""
        );
        assert_eq!(strip_wrapping_double_quotes("\""), "\"");
        assert_eq!(strip_wrapping_double_quotes("plain"), "plain");
    }

    #[test]
    fn test_shell_detected_by_binary_dir() {
        let engine = PolicyEngine::builder()
            .canonicalizer(
                TableCanonicalizer::default()
                    .with("/opt/shells", "/usr/bin")
                    .with("/usr/bin", "/usr/bin")
                    .with("/bin", "/bin"),
            )
            .build();

        assert!(engine.is_shell(Path::new("/opt/shells/mksh"), None));
        assert!(engine.is_shell(Path::new("/bin/yash"), None));
        assert!(!engine.is_shell(Path::new("/opt/other/mksh"), None));
        assert!(!engine.is_shell(Path::new("/usr/bin/python"), None));
        assert!(engine.is_shell(Path::new("zsh"), None));
        assert!(!engine.is_shell(Path::new("mksh"), None));
        assert!(engine.is_shell(Path::new("shells/mksh"), Some(Path::new("/opt"))));
    }

    #[test]
    fn test_banned_executable_by_canonical_name() {
        let engine = PolicyEngine::builder()
            .canonicalizer(TableCanonicalizer::default().with("/usr/local/bin/fetch", "/usr/bin/curl"))
            .build();
        let spec = CommandSpec::parse("/usr/local/bin/fetch http://example.com/").unwrap();
        let result = engine.check(spec, Some(&only(Restriction::PreventBannedExecutables)));
        assert!(matches!(
            result,
            Err(CommandError::Violation(Violation::BannedExecutable { ref name, .. })) if name == "curl"
        ));
    }

    #[test]
    fn test_banned_executable_unresolvable_uses_literal_name() {
        let engine = PolicyEngine::builder()
            .canonicalizer(TableCanonicalizer::default())
            .build();
        let spec = CommandSpec::parse("wget http://evil.com/").unwrap();
        assert!(engine
            .check(spec, Some(&only(Restriction::PreventBannedExecutables)))
            .is_err());

        let spec = CommandSpec::parse("/opt/tools/curlish http://example.com/").unwrap();
        assert!(engine
            .check(spec, Some(&only(Restriction::PreventBannedExecutables)))
            .is_ok());
    }

    #[test]
    fn test_sensitive_argument_by_canonical_path() {
        let engine = PolicyEngine::builder()
            .canonicalizer(TableCanonicalizer::default().with("shortcut", "/private/etc/shadow"))
            .build();
        let spec = CommandSpec::parse("cat shortcut").unwrap();
        let result = engine.check(spec, Some(&only(Restriction::PreventSensitiveFileArguments)));
        assert!(matches!(
            result,
            Err(CommandError::Violation(Violation::SensitiveFile { ref sensitive, .. })) if sensitive == "/etc/shadow"
        ));
    }

    #[test]
    fn test_unresolvable_argument_fails_open() {
        let engine = PolicyEngine::builder()
            .canonicalizer(TableCanonicalizer::default())
            .build();
        let spec = CommandSpec::parse("cat /etc/passwd").unwrap();
        assert!(engine
            .check(spec, Some(&only(Restriction::PreventSensitiveFileArguments)))
            .is_ok());
    }

    #[test]
    fn test_substitute_tables() {
        let engine = PolicyEngine::builder()
            .denylists(Denylists::empty().ban_executable("nmap"))
            .build();
        let spec = CommandSpec::parse("nmap -sS 10.0.0.1").unwrap();
        assert!(engine
            .check(spec, Some(&only(Restriction::PreventBannedExecutables)))
            .is_err());
        let spec = CommandSpec::parse("curl http://example.com/").unwrap();
        assert!(engine
            .check(spec, Some(&only(Restriction::PreventBannedExecutables)))
            .is_ok());
    }

    #[test]
    fn test_checks_run_in_order() {
        // Chaining is reported before the banned executable and sensitive file.
        let result = check_argv(
            &["/bin/sh", "-c", "curl x; cat /etc/passwd"],
            &RestrictionSet::all(),
        );
        assert!(matches!(
            result,
            Err(CommandError::Violation(Violation::CommandChaining { .. }))
        ));
    }

    #[test]
    fn test_prepare_blank_line_passes_through() {
        let engine = PolicyEngine::default();
        for line in ["", " ", "\t"] {
            let mut request = CommandRequest::line(line);
            request.restrictions = None;
            let prepared = engine.prepare(request);
            assert!(prepared.is_ok(), "{line:?}");
            assert!(prepared.unwrap().program().is_none());
        }
    }

    #[test]
    fn test_prepare_argv_keeps_original_values() {
        let request = CommandRequest::argv(["echo", " padded "]);
        let prepared = PolicyEngine::default().prepare(request).unwrap();
        assert_eq!(prepared.program(), Some(Path::new("echo")));
        assert_eq!(prepared.argv(), &[" padded ".to_string()]);
    }

    #[test]
    fn test_prepare_line_uses_tokens() {
        let request = CommandRequest::line("ls -al '2nd arg'").with_cwd("/tmp");
        let prepared = PolicyEngine::default().prepare(request).unwrap();
        assert_eq!(prepared.program(), Some(Path::new("ls")));
        assert_eq!(prepared.argv(), &["-al".to_string(), "2nd arg".to_string()]);
        assert_eq!(prepared.cwd(), Some(Path::new("/tmp")));
    }
}
