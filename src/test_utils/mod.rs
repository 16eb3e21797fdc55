//! Test helpers shared between unit and integration tests.
//!
//! Available to integration tests through the `test-utils` feature, which
//! the crate enables for itself as a dev-dependency.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::ResolverError;
use crate::exec::{CommandOutput, CommandRunner};

/// One recorded [`MockRunner`] invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The full shell command line the resolver built.
    pub command: String,
    /// The working directory the command would have run in.
    pub working_directory: PathBuf,
}

enum Scripted {
    Output(CommandOutput),
    Timeout,
}

/// A [`CommandRunner`] that replays scripted outputs instead of spawning
/// processes, recording every invocation.
///
/// Scripted responses are consumed front to back; once the queue is empty
/// every further call gets the default response (a successful exit with
/// output that contains no include flags), which drives the resolver into
/// its extraction-failure path. Cache tests assert on [`call_count`].
///
/// [`call_count`]: MockRunner::call_count
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful invocation producing `output`.
    pub fn push_output(&self, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Output(CommandOutput {
                success: true,
                output: output.to_string(),
            }));
    }

    /// Queues a non-zero-exit invocation producing `output`.
    pub fn push_failure(&self, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Output(CommandOutput {
                success: false,
                output: output.to_string(),
            }));
    }

    /// Queues a timeout.
    pub fn push_timeout(&self) {
        self.responses.lock().unwrap().push_back(Scripted::Timeout);
    }

    /// Everything the resolver asked this runner to execute, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CommandRunner for MockRunner {
    fn run<'a>(
        &'a self,
        command: &'a str,
        working_directory: &'a Path,
    ) -> BoxFuture<'a, Result<CommandOutput, ResolverError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RecordedCall {
                command: command.to_string(),
                working_directory: working_directory.to_path_buf(),
            });
            match self.responses.lock().unwrap().pop_front() {
                Some(Scripted::Output(out)) => Ok(out),
                Some(Scripted::Timeout) => Err(ResolverError::ProcessTimeout {
                    command: command.to_string(),
                    seconds: 40,
                }),
                None => Ok(CommandOutput {
                    success: true,
                    output: "echo nothing useful here\n".to_string(),
                }),
            }
        })
    }
}
