//! incpath - include-path resolution by build-system introspection
//!
//! Discovers a C/C++ translation unit's effective include search path by
//! driving an external build tool (`make`, or the legacy `unsermake`)
//! non-destructively: the source file is made to look freshly modified, a
//! dry-run build trace is requested, recursive make steps are followed into
//! their directories, and the resulting compiler command lines are mined
//! for `-I`/`--include-dir=` flags. Results are cached per build directory
//! with a failure backoff window so broken build trees do not trigger a
//! shell invocation on every request.
//!
//! # Architecture Overview
//!
//! - [`resolver`] - the orchestration core, [`resolver::IncludePathResolver`]
//! - [`make`] - per-directory build-tool facts (variant sniffing, dry-run
//!   command templates, candidate target names)
//! - [`extract`] - regex-based mining of dry-run output (quoting, escaped
//!   paths, recursive-make detection)
//! - [`cache`] - the process-wide per-directory result cache with
//!   time-based failure suppression
//! - [`exec`] - external command execution with merged output and a fixed
//!   timeout, behind the [`exec::CommandRunner`] seam
//! - [`core`] - the error taxonomy and the [`core::ResolutionResult`]
//!   value every resolution call returns
//! - [`utils`] - lexical path handling and scoped file-time faking
//!
//! # Example
//!
//! ```rust,no_run
//! use incpath::resolver::IncludePathResolver;
//! use std::path::Path;
//!
//! # async fn example() {
//! let resolver = IncludePathResolver::new();
//! let result = resolver
//!     .resolve_in(Path::new("widget.cpp"), Path::new("/home/me/project/src"))
//!     .await;
//! if result.success() {
//!     for path in &result.paths {
//!         println!("{}", path.display());
//!     }
//! } else {
//!     eprintln!("{}", result.error_message);
//! }
//! # }
//! ```
//!
//! # Manual overrides
//!
//! A `.kdev_include_paths` file in the working directory replaces
//! automatic resolution entirely: plain lines are literal include paths,
//! and `RESOLVE: SOURCE=<src> BUILD=<build>` lines resolve through an
//! out-of-source build tree (see
//! [`resolver::IncludePathResolver::set_out_of_source_build`]).
//!
//! # Concurrency
//!
//! Resolution is a synchronous, blocking affair from the caller's point of
//! view: one in-flight resolution per resolver instance (a second caller
//! fails fast), any number of instances sharing one [`cache::ResolutionCache`]
//! behind a single mutex that is never held across process execution.

pub mod cache;
pub mod constants;
pub mod core;
pub mod exec;
pub mod extract;
pub mod make;
pub mod resolver;
pub mod utils;

// Shared between unit tests and the integration suite.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::cache::{CacheEntry, ResolutionCache};
pub use crate::core::{ResolutionResult, ResolverError};
pub use crate::exec::{CommandOutput, CommandRunner, ShellRunner};
pub use crate::resolver::IncludePathResolver;
