//! Parsed command model.
//!
//! A [`CommandSpec`] is an executable plus an ordered list of [`Argument`]s,
//! with optional `${name}` substitution applied when the arguments are read
//! back. It is built per request and dropped after the check and launch.

use crate::error::{ArgumentError, CommandError, SubstitutionError};
use crate::substitution::{
    substitute, to_platform_separators, SubstitutionMap, SubstitutionMode,
};
use crate::tokenizer::tokenize;
use std::fmt;

const QUOTES: &[char] = &['\'', '"'];

/// A single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    value: String,
    quote_on_serialize: bool,
}

impl Argument {
    /// The trimmed value as stored, before substitution.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the value is re-quoted by [`CommandSpec::expand_and_get_arguments`].
    pub fn quote_on_serialize(&self) -> bool {
        self.quote_on_serialize
    }
}

/// Quote `value` so that it reads back as a single shell word.
///
/// Leading and trailing quote characters are stripped first. A value holding
/// a double quote is wrapped in single quotes; a value holding a single quote
/// or a space is wrapped in double quotes; anything else is returned as is.
///
/// # Errors
///
/// Returns `ArgumentError::MixedQuotes` if the cleaned value contains both
/// quote characters.
pub fn quote_argument(value: &str) -> Result<String, ArgumentError> {
    let cleaned = value.trim().trim_matches(QUOTES);

    if cleaned.contains('"') {
        if cleaned.contains('\'') {
            return Err(ArgumentError::MixedQuotes {
                value: value.to_string(),
            });
        }
        return Ok(format!("'{cleaned}'"));
    }

    if cleaned.contains('\'') || cleaned.contains(' ') {
        return Ok(format!("\"{cleaned}\""));
    }

    Ok(cleaned.to_string())
}

/// An executable and its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    executable: String,
    arguments: Vec<Argument>,
    substitutions: Option<SubstitutionMap>,
    substitution_mode: SubstitutionMode,
}

impl CommandSpec {
    /// Create a spec with no arguments.
    ///
    /// Slashes and backslashes in the executable are converted to the
    /// platform separator.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::EmptyExecutable` if `executable` is blank.
    pub fn new(executable: impl AsRef<str>) -> Result<Self, ArgumentError> {
        let executable = executable.as_ref();
        if executable.trim().is_empty() {
            return Err(ArgumentError::EmptyExecutable);
        }

        Ok(Self {
            executable: to_platform_separators(executable),
            arguments: Vec::new(),
            substitutions: None,
            substitution_mode: SubstitutionMode::Lenient,
        })
    }

    /// Parse a shell-style command line.
    ///
    /// The first token is the executable, the rest are arguments.
    ///
    /// # Errors
    ///
    /// - `EmptyCommandLine` if `line` is blank
    /// - `UnbalancedQuotes` if a quote is left open
    /// - `EmptyExecutable` if the first token is empty (e.g. `'' foo`)
    /// - `MixedQuotes` if an argument cannot be re-quoted
    pub fn parse(line: &str) -> Result<Self, ArgumentError> {
        if line.trim().is_empty() {
            return Err(ArgumentError::EmptyCommandLine);
        }

        let mut tokens = tokenize(line)?.into_iter();
        let executable = tokens.next().ok_or(ArgumentError::EmptyExecutable)?;

        let mut spec = Self::new(executable)?;
        for token in tokens {
            spec.add_argument(token)?;
        }
        Ok(spec)
    }

    /// Build a spec from a pre-split argv, `argv[0]` being the executable.
    ///
    /// # Errors
    ///
    /// - `EmptyExecutable` if `argv` is empty or `argv[0]` is blank
    /// - `MixedQuotes` if an argument cannot be re-quoted
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, ArgumentError> {
        let (executable, rest) = argv.split_first().ok_or(ArgumentError::EmptyExecutable)?;

        let mut spec = Self::new(executable)?;
        for arg in rest {
            spec.add_argument(arg.as_ref())?;
        }
        Ok(spec)
    }

    /// Attach a substitution map used when arguments are read back.
    pub fn with_substitutions(mut self, substitutions: SubstitutionMap) -> Self {
        self.substitutions = Some(substitutions);
        self
    }

    /// Fail on `${name}` references missing from the map instead of
    /// leaving them in place.
    pub fn strict_substitution(mut self) -> Self {
        self.substitution_mode = SubstitutionMode::Strict;
        self
    }

    /// Add an argument that is re-quoted on serialization.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::MixedQuotes` if the value holds both quote
    /// characters.
    pub fn add_argument(&mut self, value: impl Into<String>) -> Result<&mut Self, ArgumentError> {
        let value = value.into();
        quote_argument(&value)?;
        self.push(value, true);
        Ok(self)
    }

    /// Add an argument that is serialized verbatim.
    pub fn add_argument_unquoted(&mut self, value: impl Into<String>) -> &mut Self {
        self.push(value.into(), false);
        self
    }

    /// Tokenize `line` and add each token as a re-quoted argument.
    ///
    /// # Errors
    ///
    /// Returns the tokenizer's error, or `MixedQuotes` for an unquotable token.
    pub fn add_arguments_line(&mut self, line: &str) -> Result<&mut Self, ArgumentError> {
        for token in tokenize(line)? {
            self.add_argument(token)?;
        }
        Ok(self)
    }

    fn push(&mut self, value: String, quote_on_serialize: bool) {
        self.arguments.push(Argument {
            value: value.trim().to_string(),
            quote_on_serialize,
        });
    }

    fn expand(&self, token: &str) -> Result<String, SubstitutionError> {
        substitute(token, self.substitutions.as_ref(), self.substitution_mode)
    }

    /// The executable as given, without substitution.
    pub fn raw_executable(&self) -> &str {
        &self.executable
    }

    /// The stored arguments, without substitution.
    pub fn raw_arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// The executable after substitution, with platform separators.
    pub fn executable(&self) -> Result<String, SubstitutionError> {
        Ok(to_platform_separators(&self.expand(&self.executable)?))
    }

    /// Arguments after substitution, unquoted. This is the argv a process
    /// receives.
    pub fn expanded_arguments(&self) -> Result<Vec<String>, SubstitutionError> {
        self.arguments.iter().map(|arg| self.expand(&arg.value)).collect()
    }

    /// Arguments after substitution, re-quoted where marked.
    pub fn expand_and_get_arguments(&self) -> Result<Vec<String>, CommandError> {
        let mut result = Vec::with_capacity(self.arguments.len());
        for arg in &self.arguments {
            let expanded = self.expand(&arg.value)?;
            if arg.quote_on_serialize {
                result.push(quote_argument(&expanded)?);
            } else {
                result.push(expanded);
            }
        }
        Ok(result)
    }

    /// Executable followed by the serialized arguments.
    pub fn to_strings(&self) -> Result<Vec<String>, CommandError> {
        let mut result = Vec::with_capacity(self.arguments.len() + 1);
        result.push(self.executable()?);
        result.extend(self.expand_and_get_arguments()?);
        Ok(result)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_strings() {
            Ok(parts) => write!(f, "[{}]", parts.join(", ")),
            Err(_) => {
                // Fall back to the unexpanded form so a bad reference still logs.
                write!(f, "[{}", self.executable)?;
                for arg in &self.arguments {
                    write!(f, ", {}", arg.value)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitution::SubstitutionValue;

    #[test]
    fn test_parse_splits_executable_and_arguments() {
        let spec = CommandSpec::parse("ls -al '2nd arg'").unwrap();
        assert_eq!(spec.executable().unwrap(), "ls");
        assert_eq!(spec.expanded_arguments().unwrap(), vec!["-al", "2nd arg"]);
        assert_eq!(
            spec.expand_and_get_arguments().unwrap(),
            vec!["-al", "\"2nd arg\""]
        );
    }

    #[test]
    fn test_parse_blank_line_rejected() {
        assert_eq!(
            CommandSpec::parse("   "),
            Err(ArgumentError::EmptyCommandLine)
        );
    }

    #[test]
    fn test_parse_empty_executable_rejected() {
        assert_eq!(
            CommandSpec::parse("'' foo"),
            Err(ArgumentError::EmptyExecutable)
        );
        assert_eq!(
            CommandSpec::parse("# only a comment"),
            Err(ArgumentError::EmptyExecutable)
        );
    }

    #[test]
    fn test_from_argv() {
        let spec = CommandSpec::from_argv(&["/bin/sh", "-c", "echo hi"]).unwrap();
        assert_eq!(spec.executable().unwrap(), "/bin/sh");
        assert_eq!(spec.expanded_arguments().unwrap(), vec!["-c", "echo hi"]);

        let empty: [&str; 0] = [];
        assert_eq!(
            CommandSpec::from_argv(&empty),
            Err(ArgumentError::EmptyExecutable)
        );
    }

    #[test]
    fn test_arguments_are_trimmed() {
        let mut spec = CommandSpec::new("echo").unwrap();
        spec.add_argument("  padded  ").unwrap();
        assert_eq!(spec.raw_arguments()[0].value(), "padded");
    }

    #[test]
    fn test_mixed_quotes_rejected() {
        let mut spec = CommandSpec::new("echo").unwrap();
        let result = spec.add_argument("it's \"quoted\"");
        assert!(matches!(result, Err(ArgumentError::MixedQuotes { .. })));
        assert!(spec.raw_arguments().is_empty());
    }

    #[test]
    fn test_unquoted_argument_skips_quote_check() {
        let mut spec = CommandSpec::new("echo").unwrap();
        spec.add_argument_unquoted("it's \"quoted\"");
        assert_eq!(
            spec.expand_and_get_arguments().unwrap(),
            vec!["it's \"quoted\""]
        );
    }

    #[test]
    fn test_quote_argument_rules() {
        assert_eq!(quote_argument("plain").unwrap(), "plain");
        assert_eq!(quote_argument("two words").unwrap(), "\"two words\"");
        assert_eq!(quote_argument("it's").unwrap(), "\"it's\"");
        assert_eq!(quote_argument("say \"hi\" now").unwrap(), "'say \"hi\" now'");
        assert_eq!(quote_argument("\"already quoted\"").unwrap(), "\"already quoted\"");
        assert_eq!(quote_argument("'\"x\"'").unwrap(), "x");
        assert!(quote_argument("a'b\"c").is_err());
    }

    #[test]
    fn test_quote_argument_idempotent() {
        for value in ["plain", "two words", "it's here", "-al", "/etc/hosts"] {
            let once = quote_argument(value).unwrap();
            let twice = quote_argument(&once).unwrap();
            assert_eq!(once, twice, "value {value:?}");
        }
    }

    #[test]
    fn test_add_arguments_line() {
        let mut spec = CommandSpec::new("grep").unwrap();
        spec.add_arguments_line("-n 'a b' file").unwrap();
        assert_eq!(spec.expanded_arguments().unwrap(), vec!["-n", "a b", "file"]);
    }

    #[test]
    fn test_substitution_applies_to_executable_and_arguments() {
        let mut map = SubstitutionMap::new();
        map.insert("tool".to_string(), SubstitutionValue::from("/usr/bin/grep"));
        map.insert("pattern".to_string(), SubstitutionValue::from("needle in"));

        let spec = CommandSpec::parse("${tool} -n ${pattern} ${missing}")
            .unwrap()
            .with_substitutions(map);

        assert_eq!(spec.executable().unwrap(), "/usr/bin/grep");
        assert_eq!(
            spec.expand_and_get_arguments().unwrap(),
            vec!["-n", "\"needle in\"", "${missing}"]
        );
    }

    #[test]
    fn test_strict_substitution_fails_on_missing() {
        let mut map = SubstitutionMap::new();
        map.insert("a".to_string(), SubstitutionValue::from("1"));
        let spec = CommandSpec::parse("echo ${b}")
            .unwrap()
            .with_substitutions(map)
            .strict_substitution();

        assert!(matches!(
            spec.expand_and_get_arguments(),
            Err(CommandError::Substitution(SubstitutionError::Unresolved { .. }))
        ));
    }

    #[test]
    fn test_display_renders_bracketed_list() {
        let spec = CommandSpec::parse("ls -al '2nd arg'").unwrap();
        assert_eq!(spec.to_string(), "[ls, -al, \"2nd arg\"]");
    }

    #[test]
    fn test_plain_command_round_trip() {
        let line = "ls -al /etc";
        let spec = CommandSpec::parse(line).unwrap();
        assert_eq!(spec.to_strings().unwrap().join(" "), line);
    }
}
