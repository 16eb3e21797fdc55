//! Error handling for incpath
//!
//! The resolver follows two principles:
//! 1. **Strongly-typed errors** for the failure modes the lower layers can
//!    hit (process execution, extraction, malformed input)
//! 2. **Errors as data at the boundary**: the public resolution entry
//!    points never propagate these past the API surface. Every variant is
//!    recovered into a [`ResolutionResult`](crate::core::ResolutionResult)
//!    carrying a short human message plus a full diagnostic, so callers and
//!    UIs can degrade gracefully.
//!
//! Genuine I/O exhaustion (e.g. failing to stat a file the OS just handed
//! us) travels through [`anyhow`] with context at the call site and is
//! folded into the same result type by the resolver.

use std::path::PathBuf;
use thiserror::Error;

/// Typed failure modes of include-path resolution.
///
/// Variants map one-to-one onto the error taxonomy surfaced through
/// [`ResolutionResult`](crate::core::ResolutionResult): each has a short
/// display form used as the `error_message` and enough payload to build
/// the full `long_error_message`.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Another resolution is already in progress on this resolver instance.
    ///
    /// The in-progress guard is a single permit, not a queue: a concurrent
    /// caller gets this error immediately instead of waiting.
    #[error("Tried include path resolution while another resolution process was still running")]
    AlreadyResolving,

    /// The source file name carries no extension, so no object-file target
    /// name can be derived from it.
    #[error("Filename {file} seems to be malformed")]
    MalformedFilename {
        /// The file name that could not be turned into a target base name
        file: String,
    },

    /// No `Makefile` was found in the working directory or any parent up
    /// to the step limit.
    #[error("Makefile is missing in folder \"{directory}\"")]
    MissingMakefile {
        /// The (mapped) build directory that was searched
        directory: PathBuf,
    },

    /// The external build tool returned a non-zero exit status.
    #[error("Make process failed")]
    ProcessFailed {
        /// The exact command line that was executed
        command: String,
        /// Merged stdout/stderr of the failed invocation
        output: String,
    },

    /// The external build tool did not finish within the fixed timeout.
    #[error("Make process timed out after {seconds} seconds")]
    ProcessTimeout {
        /// The exact command line that was executed
        command: String,
        /// The timeout that expired, in seconds
        seconds: u64,
    },

    /// The external build tool could not be started at all.
    #[error("Failed to execute command: {command}")]
    ProcessSpawn {
        /// The exact command line that failed to start
        command: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The dry-run ran but its output contained no include-path flags.
    ///
    /// "Ran successfully but found nothing" is indistinguishable from "this
    /// build system does not expose include paths through its trace", so
    /// both surface as failures and feed the retry-backoff cache.
    #[error("Could not extract include paths from make output")]
    NoIncludePaths {
        /// Working directory of the invocation
        directory: PathBuf,
        /// The exact command line that was executed
        command: String,
        /// Merged output that yielded no paths
        output: String,
    },

    /// A recursive make call was detected but its parameter string was
    /// ambiguous (contained `;` or `&&`).
    #[error("Recursive make call failed")]
    RecursiveMakeBadParameters {
        /// The rejected parameter string
        parameters: String,
        /// Full output the call was parsed from
        output: String,
    },

    /// A recursive make call pointed at a directory that does not exist.
    #[error("Recursive make call failed")]
    RecursiveMakeMissingDirectory {
        /// The directory the `cd` prefix named
        directory: PathBuf,
        /// Full output the call was parsed from
        output: String,
    },

    /// The first output line invoked make behind a prefix that is not a
    /// plain `cd <dir> &&` / `cd <dir>;` chain.
    #[error("Malformed recursive make call")]
    MalformedRecursiveMake {
        /// Full output the call was parsed from
        output: String,
    },

    /// Underlying I/O error from the filesystem collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// The full diagnostic for this error, suitable for
    /// `ResolutionResult::long_error_message`.
    ///
    /// Wording follows the original resolver's messages so that logs stay
    /// greppable across versions.
    pub fn long_message(&self) -> String {
        match self {
            Self::ProcessFailed { output, .. } => format!("Output: {output}"),
            Self::ProcessTimeout { command, seconds } => {
                format!("The command \"{command}\" did not finish within {seconds} seconds")
            }
            Self::ProcessSpawn { command, source } => {
                format!("Could not start \"{command}\": {source}")
            }
            Self::NoIncludePaths {
                directory,
                command,
                output,
            } => format!(
                "Folder: \"{}\"  Command: \"{}\"  Output: \"{}\"",
                directory.display(),
                command,
                output
            ),
            Self::RecursiveMakeBadParameters { parameters, output } => format!(
                "The parameter string \"{parameters}\" does not seem to be valid. Output was: {output}."
            ),
            Self::RecursiveMakeMissingDirectory { directory, output } => format!(
                "The directory \"{}\" does not exist. Output was: {}.",
                directory.display(),
                output
            ),
            Self::MalformedRecursiveMake { output } => format!("Output was: {output}"),
            Self::MissingMakefile { directory } => format!(
                "Problem while trying to resolve include paths below \"{}\"",
                directory.display()
            ),
            other => other.to_string(),
        }
    }
}
