//! Bounded command execution.
//!
//! [`BoundedExecutor`] runs one external program per call with an explicit
//! argv and connects its stdout and stderr straight to two artifact files.
//! Output never passes through process memory, so a command producing
//! gigabytes costs the same heap as one producing nothing.
//!
//! Spawn failures, non-zero exits and cancellation are all reported as an
//! [`ExecutionResult`]. The only `Err` is a storage failure, which happens
//! before anything is spawned.
//!
//! # Example
//!
//! ```no_run
//! use tollgate::executor::{BoundedExecutor, ExecutionRequest};
//!
//! # async fn run() -> tollgate::error::TollgateResult<()> {
//! let executor = BoundedExecutor::new("/tmp/tollgate-artifacts");
//! let result = executor
//!     .execute(ExecutionRequest::new("rg").args(["--line-number", "TODO", "src"]))
//!     .await?;
//! println!("{} bytes in {}", result.output_size_bytes, result.output_path.display());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
mod process;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use artifacts::{count_delimited, count_records_where, file_size, read_head, ArtifactPair, ArtifactStore};

use crate::error::TollgateResult;

/// How a finished execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Exit code 0.
    Success,
    /// The process ran and reported failure, or was killed by a signal.
    NonZeroExit,
    /// The program could not be launched.
    SpawnFailure,
    /// The cancellation token fired before the process finished.
    Cancelled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::SpawnFailure => "spawn failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// A single program invocation.
///
/// Arguments are passed to the OS as a vector; nothing here joins them
/// into shell text.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    cancel: CancellationToken,
    label: Option<String>,
}

impl ExecutionRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            cancel: CancellationToken::new(),
            label: None,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Prefix for artifact file names. Defaults to the program name.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Display form of the command line, quoted for readability only.
    #[must_use]
    pub fn display_command(&self) -> String {
        shell_words::join(std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)))
    }
}

/// Outcome of one execution.
///
/// `output_path` and `error_path` always exist on disk, possibly empty,
/// whatever the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// `None` for spawn failures, cancellation and signal deaths.
    pub exit_code: Option<i32>,
    pub output_path: PathBuf,
    pub error_path: PathBuf,
    pub output_size_bytes: u64,
    pub error_size_bytes: u64,
    pub execution_time_ms: u64,
    pub command: String,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Runs programs with output streamed to disk.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    store: ArtifactStore,
}

impl BoundedExecutor {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: ArtifactStore::new(storage_dir),
        }
    }

    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        self.store.root()
    }

    /// Runs `request` to completion or cancellation. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`TollgateError::Storage`](crate::error::TollgateError) if the
    /// artifact files cannot be created.
    pub async fn execute(&self, request: ExecutionRequest) -> TollgateResult<ExecutionResult> {
        let label = request.label.as_deref().unwrap_or(&request.program);
        let (pair, stdout, stderr) = self.store.create(label)?;
        let command = request.display_command();
        let start = Instant::now();

        let finish = |status: ExecutionStatus, exit_code: Option<i32>| ExecutionResult {
            status,
            exit_code,
            output_size_bytes: file_size(&pair.output_path),
            error_size_bytes: file_size(&pair.error_path),
            output_path: pair.output_path.clone(),
            error_path: pair.error_path.clone(),
            execution_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            command: command.clone(),
        };

        if request.cancel.is_cancelled() {
            debug!(command = %command, "Cancelled before spawn");
            return Ok(finish(ExecutionStatus::Cancelled, None));
        }

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        process::configure_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Failed to spawn process");
                let message = format!("failed to spawn '{}': {}", request.program, e);
                if let Err(write_err) = artifacts::append_line(&pair.error_path, &message) {
                    warn!(path = %pair.error_path.display(), error = %write_err, "Could not record spawn failure");
                }
                return Ok(finish(ExecutionStatus::SpawnFailure, None));
            }
        };
        debug!(command = %command, pid = ?child.id(), "Spawned process");

        if let (Some(payload), Some(mut pipe)) = (request.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                // The child may exit without reading; a broken pipe is expected then.
                if let Err(e) = pipe.write_all(&payload).await {
                    debug!(error = %e, "Stdin not fully consumed");
                }
            });
        }

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = request.cancel.cancelled() => None,
        };

        let result = match waited {
            Some(Ok(status)) => {
                let kind = if status.success() {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NonZeroExit
                };
                finish(kind, status.code())
            }
            Some(Err(e)) => {
                warn!(command = %command, error = %e, "Failed waiting for process");
                if let Err(write_err) = artifacts::append_line(&pair.error_path, &format!("wait failed: {e}")) {
                    warn!(path = %pair.error_path.display(), error = %write_err, "Could not record wait failure");
                }
                finish(ExecutionStatus::NonZeroExit, None)
            }
            None => {
                process::terminate_tree(&mut child).await;
                debug!(command = %command, "Process tree killed on cancellation");
                finish(ExecutionStatus::Cancelled, None)
            }
        };

        debug!(
            command = %command,
            status = %result.status,
            exit_code = ?result.exit_code,
            output_bytes = result.output_size_bytes,
            elapsed_ms = result.execution_time_ms,
            "Process finished"
        );
        Ok(result)
    }
}
