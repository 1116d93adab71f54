//! Checked command ready for execution.
//!
//! This module contains `PreparedCommand`, which can only be created
//! by `PolicyEngine::prepare()`. This ensures all execution goes through the
//! policy checks.

use crate::error::ExecError;
use crate::limits::ResourceLimits;
use crate::output::Output;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

/// A checked command ready for execution.
///
/// This type cannot be constructed outside of `command_guard`.
/// The only way to create it is via `PolicyEngine::prepare()`.
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub(crate) program: Option<PathBuf>,
    pub(crate) argv: Vec<String>,
    pub(crate) env: Option<HashMap<String, String>>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) limits: ResourceLimits,
}

/// Read `reader` to EOF, failing once more than `limit` bytes arrive.
async fn read_limited<R, F>(
    mut reader: R,
    limit: usize,
    stream: &str,
    exceeded: F,
) -> Result<Vec<u8>, ExecError>
where
    R: AsyncRead + Unpin,
    F: Fn(usize) -> ExecError,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return Ok(out),
            Ok(n) => {
                if out.len() + n > limit {
                    return Err(exceeded(limit));
                }
                out.extend_from_slice(&buf[..n]);
            }
            Err(e) => {
                return Err(ExecError::SpawnFailed {
                    reason: format!("{stream} read error: {e}"),
                });
            }
        }
    }
}

impl PreparedCommand {
    /// Execute the prepared command asynchronously.
    ///
    /// The environment replaces the parent's when one was requested, and is
    /// inherited otherwise. Stdin is closed.
    ///
    /// # Errors
    ///
    /// - `ExecError::EmptyCommand` if the request was a blank command line
    /// - `ExecError::SpawnFailed` if the process couldn't be started
    /// - `ExecError::Timeout` if the process exceeded the timeout
    /// - `ExecError::StdoutLimitExceeded` if stdout exceeded the limit
    /// - `ExecError::StderrLimitExceeded` if stderr exceeded the limit
    pub async fn spawn(self) -> Result<Output, ExecError> {
        let program = self.program.ok_or(ExecError::EmptyCommand)?;
        let start = Instant::now();

        let mut cmd = Command::new(&program);
        cmd.args(&self.argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(env) = &self.env {
            cmd.env_clear().envs(env);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!(program = %program.display(), args = self.argv.len(), "spawning command");

        let mut child = cmd.spawn().map_err(|e| ExecError::SpawnFailed {
            reason: e.to_string(),
        })?;

        let missing_pipe = || ExecError::SpawnFailed {
            reason: "child pipes unavailable".to_string(),
        };
        let stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        let stderr = child.stderr.take().ok_or_else(missing_pipe)?;

        let limits = self.limits;

        // The timeout covers the exit as well as the output.
        let run = async {
            let (stdout_res, stderr_res) = tokio::join!(
                read_limited(stdout, limits.max_stdout, "stdout", |limit| {
                    ExecError::StdoutLimitExceeded { limit }
                }),
                read_limited(stderr, limits.max_stderr, "stderr", |limit| {
                    ExecError::StderrLimitExceeded { limit }
                }),
            );
            let (stdout, stderr) = (stdout_res?, stderr_res?);
            let status = child.wait().await.map_err(|e| ExecError::SpawnFailed {
                reason: format!("wait error: {e}"),
            })?;
            Ok::<_, ExecError>((stdout, stderr, status))
        };

        match timeout(limits.timeout, run).await {
            Ok(Ok((stdout, stderr, status))) => Ok(Output {
                stdout,
                stderr,
                status,
                elapsed: start.elapsed(),
            }),
            Ok(Err(error)) => {
                // Kill the process on limit exceeded
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "kill after output limit failed");
                }
                Err(error)
            }
            Err(_) => {
                let elapsed = start.elapsed();
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "kill after timeout failed");
                }
                Err(ExecError::Timeout {
                    limit: limits.timeout,
                    elapsed,
                })
            }
        }
    }

    /// Execute the prepared command synchronously.
    ///
    /// This is a convenience wrapper that creates a runtime if needed.
    pub fn spawn_sync(self) -> Result<Output, ExecError> {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            // block_on panics on a runtime thread.
            std::thread::scope(|s| {
                s.spawn(|| handle.block_on(self.spawn()))
                    .join()
                    .unwrap_or_else(|_| {
                        Err(ExecError::SpawnFailed {
                            reason: "spawn thread panicked".to_string(),
                        })
                    })
            })
        } else {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ExecError::SpawnFailed {
                    reason: format!("failed to create runtime: {e}"),
                })?;
            rt.block_on(self.spawn())
        }
    }

    /// The program to run, `None` for a blank command line.
    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    /// Get the arguments.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Get the environment, `None` when inherited.
    pub fn env(&self) -> Option<&HashMap<String, String>> {
        self.env.as_ref()
    }

    /// Get the working directory, `None` when inherited.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Get the resource limits.
    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }
}
