//! Denylist tables consulted by the policy engine.
//!
//! The standard tables are built once per process and never mutated. Engines
//! hold them behind an `Arc`, and tests can inject substitute tables built
//! with the chained setters.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Shell interpreters whose `-c` payload is scanned for chaining.
pub const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh", "csh", "tcsh", "ash", "fish"];

/// Directories whose `*sh` executables are also treated as shells.
pub const BINARY_DIRS: &[&str] = &["/bin", "/usr/bin"];

/// Reverse shells, exfiltration and downloading tools, and package installers.
pub const BANNED_EXECUTABLES: &[&str] = &["nc", "curl", "wget", "dpkg", "rpm"];

/// System files that arguments may not target.
pub const SENSITIVE_FILES: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/group",
    "/etc/gshadow",
    "/etc/sysconfig/network",
    "/etc/network/interfaces",
    "/etc/resolv.conf",
    "/etc/sudoers",
    "/etc/hosts",
];

static STANDARD: LazyLock<Arc<Denylists>> = LazyLock::new(|| Arc::new(Denylists::default()));

/// The set of tables the policy engine checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylists {
    shells: Vec<String>,
    binary_dirs: Vec<PathBuf>,
    banned_executables: Vec<String>,
    sensitive_files: Vec<PathBuf>,
}

impl Default for Denylists {
    fn default() -> Self {
        Self {
            shells: to_strings(SHELLS),
            binary_dirs: BINARY_DIRS.iter().map(PathBuf::from).collect(),
            banned_executables: to_strings(BANNED_EXECUTABLES),
            sensitive_files: SENSITIVE_FILES.iter().map(PathBuf::from).collect(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Denylists {
    /// Create tables holding the standard entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create tables with every list empty.
    pub fn empty() -> Self {
        Self {
            shells: Vec::new(),
            binary_dirs: Vec::new(),
            banned_executables: Vec::new(),
            sensitive_files: Vec::new(),
        }
    }

    /// The process-wide standard tables.
    pub fn standard() -> Arc<Denylists> {
        Arc::clone(&STANDARD)
    }

    /// Replace the shell names.
    pub fn shells(mut self, names: &[&str]) -> Self {
        self.shells = to_strings(names);
        self
    }

    /// Replace the known binary directories.
    pub fn binary_dirs(mut self, dirs: &[&str]) -> Self {
        self.binary_dirs = dirs.iter().map(PathBuf::from).collect();
        self
    }

    /// Replace the banned executable names.
    pub fn banned_executables(mut self, names: &[&str]) -> Self {
        self.banned_executables = to_strings(names);
        self
    }

    /// Add a single banned executable name.
    pub fn ban_executable(mut self, name: impl Into<String>) -> Self {
        self.banned_executables.push(name.into());
        self
    }

    /// Replace the sensitive file paths.
    pub fn sensitive_files(mut self, paths: &[&str]) -> Self {
        self.sensitive_files = paths.iter().map(PathBuf::from).collect();
        self
    }

    /// Add a single sensitive file path.
    pub fn sensitive_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sensitive_files.push(path.into());
        self
    }

    /// Is `name` exactly one of the shell names?
    pub fn is_shell_name(&self, name: &str) -> bool {
        self.shells.iter().any(|s| s == name)
    }

    /// Known binary directories.
    pub fn known_binary_dirs(&self) -> &[PathBuf] {
        &self.binary_dirs
    }

    /// Is `name` exactly one of the banned executable names?
    pub fn is_banned(&self, name: &str) -> bool {
        self.banned_executables.iter().any(|s| s == name)
    }

    /// The sensitive entry that `canonical` ends with, comparing whole
    /// components. `/private/etc/passwd` matches `/etc/passwd`;
    /// `/etc/passwd.bak` does not.
    pub fn sensitive_match(&self, canonical: &Path) -> Option<&Path> {
        self.sensitive_files
            .iter()
            .find(|sensitive| {
                let suffix = sensitive.strip_prefix("/").unwrap_or(sensitive.as_path());
                !suffix.as_os_str().is_empty() && canonical.ends_with(suffix)
            })
            .map(PathBuf::as_path)
    }
}
