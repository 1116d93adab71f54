//! Restrictions the policy engine can enforce.

use std::collections::HashSet;
use std::fmt;

/// A single check the policy engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Restriction {
    /// Reject shell `-c` payloads holding more than one command.
    PreventChaining,
    /// Reject executables on the banned list.
    PreventBannedExecutables,
    /// Reject arguments that resolve to sensitive system files.
    PreventSensitiveFileArguments,
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::PreventChaining => write!(f, "prevent-chaining"),
            Restriction::PreventBannedExecutables => write!(f, "prevent-banned-executables"),
            Restriction::PreventSensitiveFileArguments => {
                write!(f, "prevent-sensitive-file-arguments")
            }
        }
    }
}

/// A set of restrictions.
///
/// `Default` is [`default_restrictions`]; use [`RestrictionSet::empty`] to
/// run no checks at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionSet(HashSet<Restriction>);

/// Chaining and sensitive-file checks. Banned executables are opt-in.
pub fn default_restrictions() -> RestrictionSet {
    RestrictionSet::from([
        Restriction::PreventChaining,
        Restriction::PreventSensitiveFileArguments,
    ])
}

impl RestrictionSet {
    /// A set with no restrictions.
    pub fn empty() -> Self {
        Self(HashSet::new())
    }

    /// A set with every restriction.
    pub fn all() -> Self {
        Self::from([
            Restriction::PreventChaining,
            Restriction::PreventBannedExecutables,
            Restriction::PreventSensitiveFileArguments,
        ])
    }

    /// Add a restriction.
    pub fn with(mut self, restriction: Restriction) -> Self {
        self.0.insert(restriction);
        self
    }

    /// Remove a restriction.
    pub fn without(mut self, restriction: Restriction) -> Self {
        self.0.remove(&restriction);
        self
    }

    pub fn contains(&self, restriction: Restriction) -> bool {
        self.0.contains(&restriction)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RestrictionSet {
    fn default() -> Self {
        default_restrictions()
    }
}

impl<const N: usize> From<[Restriction; N]> for RestrictionSet {
    fn from(restrictions: [Restriction; N]) -> Self {
        Self(HashSet::from(restrictions))
    }
}

impl FromIterator<Restriction> for RestrictionSet {
    fn from_iter<I: IntoIterator<Item = Restriction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
