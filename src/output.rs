//! Captured output of a launched command.

use std::process::ExitStatus;
use std::time::Duration;

/// What a command wrote and how it exited.
///
/// Only produced for a command that exited within its limits; a killed
/// command yields an `ExecError` instead.
#[derive(Debug, Clone)]
pub struct Output {
    /// Everything the command wrote to stdout.
    pub stdout: Vec<u8>,

    /// Everything the command wrote to stderr.
    pub stderr: Vec<u8>,

    /// How the process exited.
    pub status: ExitStatus,

    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

impl Output {
    /// Stdout decoded as UTF-8, lossily.
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded as UTF-8, lossily.
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout split into lines, without trailing newlines.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout_string().lines().map(str::to_string).collect()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` if killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn output(stdout: &[u8], raw_status: i32) -> Output {
        Output {
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
            status: ExitStatus::from_raw(raw_status),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_lossy_decoding() {
        let out = output(b"ok \xff\n", 0);
        assert_eq!(out.stdout_string(), "ok \u{fffd}\n");
        assert!(out.stderr_string().is_empty());
    }

    #[test]
    fn test_lines() {
        let out = output(b"a\nb\r\nc", 0);
        assert_eq!(out.stdout_lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exit_code() {
        // Wait status encodes the exit code in the second byte.
        let out = output(b"", 2 << 8);
        assert!(!out.success());
        assert_eq!(out.code(), Some(2));

        // SIGKILL
        let out = output(b"", 9);
        assert_eq!(out.code(), None);
    }
}
