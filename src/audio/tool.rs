//! Builder for running FFmpeg-family tools with timeout and cancellation.
//!
//! Every invocation captures stdout and stderr, races the child against a
//! [`CancellationToken`] and a timeout, and kills the child if either fires
//! first. A non-zero exit is returned as data, not as an error: decode passes
//! need the exit code alongside the diagnostics.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, ScanError};

/// Default command timeout: 1 hour. Full decodes of long books are slow.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A builder for constructing and executing external tool invocations.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`ScanError::Cancelled`] if `cancel` fires; the child is killed first.
    /// - [`ScanError::ToolLaunch`] if spawning fails, waiting fails, or the
    ///   timeout expires (the child is killed first).
    pub async fn execute(&self, cancel: &CancellationToken) -> Result<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let program_name = self.program_name();
        debug!("Running {} {}", program_name, self.args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScanError::ToolLaunch {
                tool: program_name.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe.
        let stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = cancel.cancelled() => Waited::Cancelled,
            _ = tokio::time::sleep(self.timeout) => Waited::TimedOut,
        };

        let status = match waited {
            Waited::Exited(Ok(status)) => status,
            Waited::Exited(Err(e)) => {
                return Err(ScanError::ToolLaunch {
                    tool: program_name,
                    message: format!("I/O error waiting for process: {e}"),
                });
            }
            Waited::Cancelled => {
                terminate(&mut child, &program_name).await;
                return Err(ScanError::Cancelled);
            }
            Waited::TimedOut => {
                terminate(&mut child, &program_name).await;
                return Err(ScanError::ToolLaunch {
                    tool: program_name,
                    message: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Pipe read ended early: {e}");
        }
    }
    buf
}

async fn terminate(child: &mut Child, program_name: &str) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", program_name, e);
    } else {
        debug!("Killed {}", program_name);
    }
}
