//! Global constants used throughout the incpath codebase.
//!
//! Timeout durations, cache policy windows, and search limits used across
//! multiple modules. Defining them centrally keeps the magic numbers
//! discoverable.

use std::time::Duration;

/// Timeout for one external build-tool invocation (40 seconds).
///
/// A dry-run of `make` normally finishes in well under a second, but a
/// recursive build with a broken rule can hang on a sub-command. Expiry is
/// reported as a resolution failure, never silently ignored.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(40);

/// How long a cached failure suppresses retries (200 seconds).
///
/// Within this window a failed build directory replays its cached failure
/// instead of re-invoking the build tool, preventing repeated expensive
/// shell invocations against a directory known to be currently broken.
pub const CACHE_FAIL_GRACE: Duration = Duration::from_secs(200);

/// Default number of parent directories searched for a `Makefile`.
///
/// Resolution is often requested for a file nested well below its build
/// root, so the resolver walks upward until it finds a build-control file
/// or this limit is exhausted.
pub const DEFAULT_MAX_STEPS_UP: u32 = 20;

/// Maximum number of bytes read when sniffing the first line of a Makefile
/// for the unsermake signature.
pub const MAKEFILE_SNIFF_LEN: usize = 128;

/// Name of the build-control file that gates resolution and caching.
pub const MAKEFILE_NAME: &str = "Makefile";

/// Name of the per-directory manual override file.
///
/// When present in a working directory it entirely replaces automatic
/// resolution for that directory.
pub const OVERRIDE_FILE_NAME: &str = ".kdev_include_paths";
