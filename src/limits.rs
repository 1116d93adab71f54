//! Resource limits for launched commands.

use std::time::Duration;

/// Default wall-clock timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default stdout cap, 10 MB.
pub const DEFAULT_MAX_STDOUT: usize = 10 * 1024 * 1024;

/// Default stderr cap, 1 MB.
pub const DEFAULT_MAX_STDERR: usize = 1024 * 1024;

/// Bounds applied while a prepared command runs.
///
/// Exceeding any of them kills the child and returns the matching
/// `ExecError`; output read so far is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Wall-clock limit from spawn until the process exits, covering output
    /// reads and the final wait.
    ///
    /// Default: [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,

    /// Maximum bytes captured from stdout.
    ///
    /// One byte more yields `ExecError::StdoutLimitExceeded`.
    /// Default: [`DEFAULT_MAX_STDOUT`].
    pub max_stdout: usize,

    /// Maximum bytes captured from stderr.
    ///
    /// One byte more yields `ExecError::StderrLimitExceeded`.
    /// Default: [`DEFAULT_MAX_STDERR`].
    pub max_stderr: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ResourceLimits {
    /// Limits with `timeout` and the default output caps.
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_stdout: DEFAULT_MAX_STDOUT,
            max_stderr: DEFAULT_MAX_STDERR,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_stdout(mut self, max: usize) -> Self {
        self.max_stdout = max;
        self
    }

    pub fn with_max_stderr(mut self, max: usize) -> Self {
        self.max_stderr = max;
        self
    }
}
