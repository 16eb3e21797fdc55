//! External command execution for dry-run build invocations.
//!
//! One synchronous-looking operation: run a shell command in a working
//! directory, capture merged stdout/stderr, enforce a fixed timeout, and
//! report the final exit status. There is no streaming and no cancellation
//! path; a hung tool surfaces as a timeout error when the deadline expires.
//!
//! The [`CommandRunner`] trait is the seam the resolver talks through, so
//! tests can script outputs and count invocations without ever spawning a
//! process.

use futures::future::BoxFuture;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::PROCESS_TIMEOUT;
use crate::core::ResolverError;

/// Completed invocation of an external build tool.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Merged stdout and stderr, lossily decoded.
    pub output: String,
}

/// Executes one shell command in a working directory.
///
/// Implementations must be usable from multiple tasks; the production
/// [`ShellRunner`] is stateless, test runners keep interior state behind
/// locks.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` with `working_directory` as its current directory.
    ///
    /// Returns `Ok` with the exit status and merged output when the
    /// command ran to completion (successfully or not), `Err` when it
    /// could not be started or exceeded the timeout.
    fn run<'a>(
        &'a self,
        command: &'a str,
        working_directory: &'a Path,
    ) -> BoxFuture<'a, Result<CommandOutput, ResolverError>>;
}

/// Production runner: `sh -c <command>` via [`tokio::process::Command`].
///
/// Passing the whole line to the shell keeps the quoting in the dry-run
/// templates (`-W '<file>'`) intact instead of naively splitting on
/// whitespace.
pub struct ShellRunner {
    timeout_duration: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            timeout_duration: PROCESS_TIMEOUT,
        }
    }
}

impl ShellRunner {
    /// Creates a runner with the default 40 second timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the invocation timeout.
    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(
        &'a self,
        command: &'a str,
        working_directory: &'a Path,
    ) -> BoxFuture<'a, Result<CommandOutput, ResolverError>> {
        Box::pin(async move {
            tracing::debug!(
                target: "exec",
                "executing: {command} (in {})",
                working_directory.display()
            );
            let start = std::time::Instant::now();

            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(command)
                .current_dir(working_directory)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let output_future = cmd.output();
            let output = match timeout(self.timeout_duration, output_future).await {
                Ok(io_result) => io_result.map_err(|source| ResolverError::ProcessSpawn {
                    command: command.to_string(),
                    source,
                })?,
                Err(_) => {
                    tracing::warn!(
                        target: "exec",
                        "command timed out after {}s: {command}",
                        self.timeout_duration.as_secs()
                    );
                    return Err(ResolverError::ProcessTimeout {
                        command: command.to_string(),
                        seconds: self.timeout_duration.as_secs(),
                    });
                }
            };

            let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
            if !output.stderr.is_empty() {
                merged.push_str(&String::from_utf8_lossy(&output.stderr));
            }

            let elapsed = start.elapsed();
            if elapsed.as_secs() >= 1 {
                tracing::info!(
                    target: "exec",
                    "command took {:.2}s: {command}",
                    elapsed.as_secs_f64()
                );
            } else {
                tracing::trace!(
                    target: "exec",
                    "command took {}ms",
                    elapsed.as_millis()
                );
            }
            if !output.status.success() {
                tracing::debug!(
                    target: "exec",
                    "command failed with {:?}: {command}",
                    output.status.code()
                );
            }

            Ok(CommandOutput {
                success: output.status.success(),
                output: merged,
            })
        })
    }
}
