//! Path canonicalization for denylist comparisons.
//!
//! The policy engine compares executables and arguments against denylists by
//! their canonical form. Resolution goes through the [`Canonicalizer`] trait
//! so tests can substitute a deterministic resolver.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Absolute path with symlinks resolved as far as the filesystem allows.
    Resolved(PathBuf),
    /// The input cannot be treated as a path.
    Unresolvable,
}

impl Canonical {
    /// The resolved path, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Canonical::Resolved(path) => Some(path),
            Canonical::Unresolvable => None,
        }
    }
}

/// Resolves strings to absolute, symlink-resolved paths.
pub trait Canonicalizer: Send + Sync + std::fmt::Debug {
    /// Resolve `path`. Must not panic; report failure as `Unresolvable`.
    fn canonicalize(&self, path: &Path) -> Canonical;
}

/// Filesystem-backed canonicalizer.
///
/// Relative paths resolve against the process working directory. Paths that
/// do not exist are still resolved: `.` and `..` are collapsed lexically and
/// the longest existing ancestor has its symlinks resolved, so
/// `/etc/missing/../passwd` resolves to `/etc/passwd`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCanonicalizer;

impl Canonicalizer for FsCanonicalizer {
    fn canonicalize(&self, path: &Path) -> Canonical {
        if path.as_os_str().is_empty() || path.as_os_str().as_encoded_bytes().contains(&0) {
            return Canonical::Unresolvable;
        }

        match resolve(path) {
            Ok(resolved) => Canonical::Resolved(resolved),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "path could not be canonicalized");
                Canonical::Unresolvable
            }
        }
    }
}

fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    match std::fs::canonicalize(&absolute) {
        Ok(canonical) => return Ok(canonical),
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        Err(_) => {}
    }

    let normalized = lexical_normalize(&absolute);
    let mut existing = normalized.as_path();
    let mut missing = Vec::new();

    loop {
        match std::fs::canonicalize(existing) {
            Ok(mut canonical) => {
                canonical.extend(missing.iter().rev());
                return Ok(canonical);
            }
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            Err(_) => {}
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            // Nothing on the path exists, not even the root.
            _ => return Ok(normalized),
        }
    }
}

/// Lexical path normalization (no filesystem access).
///
/// Removes `.` and resolves `..` against the preceding component. `..` at the
/// root stays at the root.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }
    components.iter().collect()
}
