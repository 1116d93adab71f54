//! `${name}` variable substitution for command tokens.

use crate::error::SubstitutionError;
use std::collections::HashMap;
use std::path::{PathBuf, MAIN_SEPARATOR};

/// A value that can be substituted into a command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionValue {
    /// Inserted verbatim.
    Text(String),
    /// Made absolute and converted to platform separators before insertion.
    Path(PathBuf),
}

impl SubstitutionValue {
    fn render(&self) -> String {
        match self {
            SubstitutionValue::Text(text) => text.clone(),
            SubstitutionValue::Path(path) => {
                let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                to_platform_separators(&absolute.to_string_lossy())
            }
        }
    }
}

impl From<&str> for SubstitutionValue {
    fn from(text: &str) -> Self {
        SubstitutionValue::Text(text.to_string())
    }
}

impl From<String> for SubstitutionValue {
    fn from(text: String) -> Self {
        SubstitutionValue::Text(text)
    }
}

impl From<PathBuf> for SubstitutionValue {
    fn from(path: PathBuf) -> Self {
        SubstitutionValue::Path(path)
    }
}

/// Mapping of variable name to value.
pub type SubstitutionMap = HashMap<String, SubstitutionValue>;

/// What to do with a `${name}` whose name is not in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstitutionMode {
    /// Leave the literal `${name}` in place (default).
    #[default]
    Lenient,
    /// Fail with `SubstitutionError::Unresolved`.
    Strict,
}

/// Replace both `/` and `\` with the platform separator.
pub fn to_platform_separators(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+')
}

/// Expand every `${name}` in `token` against `vars`.
///
/// Substituted values are not re-scanned. A `$` that is not followed by `{`
/// is kept as is. With no map, or an empty one, `token` is returned unchanged.
///
/// # Errors
///
/// - `MissingDelimiter` if the name is not followed by `}`
/// - `Unresolved` in strict mode when the name has no value
pub fn substitute(
    token: &str,
    vars: Option<&SubstitutionMap>,
    mode: SubstitutionMode,
) -> Result<String, SubstitutionError> {
    let vars = match vars {
        Some(vars) if !vars.is_empty() => vars,
        _ => return Ok(token.to_string()),
    };

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            out.push(c);
            continue;
        }
        chars.next();

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if !is_name_char(next) {
                break;
            }
            name.push(next);
            chars.next();
        }

        if chars.next() != Some('}') {
            return Err(SubstitutionError::MissingDelimiter { name });
        }

        match vars.get(&name) {
            Some(value) => out.push_str(&value.render()),
            None if mode == SubstitutionMode::Strict => {
                return Err(SubstitutionError::Unresolved { name });
            }
            None => {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        }
    }

    Ok(out)
}
