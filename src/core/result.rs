//! The value type every resolution call returns.

use std::path::PathBuf;

use crate::core::ResolverError;

/// Outcome of one include-path resolution request.
///
/// Immutable once constructed and returned by value from every resolution
/// entry point; failures are carried as data, never thrown past the public
/// API. A successful result always holds at least one path when it came
/// from dry-run extraction (zero extracted paths is itself a failure). A
/// failed result may still carry paths: the best-known list from an earlier
/// cached success, attached so callers can offer degraded functionality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionResult {
    success: bool,
    /// Extracted include directories, in first-seen order. Duplicates are
    /// kept as produced by the build tool.
    pub paths: Vec<PathBuf>,
    /// Short human-readable failure description; empty on success.
    pub error_message: String,
    /// Full diagnostic (command line and raw tool output); may be set on
    /// success too, holding the output the paths were mined from.
    pub long_error_message: String,
}

impl ResolutionResult {
    /// A successful resolution carrying `paths`.
    pub fn ok(paths: Vec<PathBuf>) -> Self {
        Self {
            success: true,
            paths,
            ..Self::default()
        }
    }

    /// A successful resolution that also keeps the raw tool output around
    /// for diagnostics.
    pub fn ok_with_output(paths: Vec<PathBuf>, output: impl Into<String>) -> Self {
        Self {
            success: true,
            paths,
            error_message: String::new(),
            long_error_message: output.into(),
        }
    }

    /// A failure with a short message only.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
            ..Self::default()
        }
    }

    /// A failure with both the short message and the full diagnostic.
    pub fn failure_with(message: impl Into<String>, long_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
            long_error_message: long_message.into(),
            ..Self::default()
        }
    }

    /// Whether the resolution succeeded.
    pub const fn success(&self) -> bool {
        self.success
    }
}

impl From<ResolverError> for ResolutionResult {
    fn from(err: ResolverError) -> Self {
        let long = err.long_message();
        Self::failure_with(err.to_string(), long)
    }
}
