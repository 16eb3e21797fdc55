//! Per-build-directory resolution cache with failure backoff.
//!
//! One entry per build directory (not per file), keyed by the directory's
//! absolute path after out-of-source mapping and validated against the
//! Makefile's modification time. A failed entry keeps serving its cached
//! failure for a bounded grace period before retries are allowed again, so
//! a broken build directory does not trigger an expensive shell invocation
//! on every completion request.
//!
//! The cache is shared process-wide across resolver instances and threads
//! behind one mutex. The lock is held only for the duration of a lookup or
//! store, never across the blocking process execution.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::constants::CACHE_FAIL_GRACE;
use crate::core::ResolutionResult;

/// Cached outcome for one build directory.
///
/// Updated in place on every resolution attempt and kept for the process
/// lifetime. A `failed` entry still carries the best-known `paths` from a
/// previous success; they are attached to failed results as a degraded
/// fallback.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Include paths from the most recent success (or earlier fallback).
    pub paths: Vec<PathBuf>,
    /// Modification time of the Makefile at resolution time.
    pub modification_time: SystemTime,
    /// Whether the last attempt failed.
    pub failed: bool,
    /// When the last failure happened; meaningless while `failed` is false.
    pub fail_time: SystemTime,
    /// Short message of the last failure.
    pub error_message: String,
    /// Full diagnostic of the last failure.
    pub long_error_message: String,
    /// File names whose resolution failed in this directory. Recorded for
    /// diagnostics only; validity decisions are purely time-based.
    pub failed_files: HashSet<String>,
}

/// Process-wide map from build directory to [`CacheEntry`].
///
/// Construct once and share via `Arc` between resolver instances; there is
/// deliberately no global singleton.
pub struct ResolutionCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    grace: Duration,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionCache {
    /// Cache with the standard 200 second failure grace window.
    pub fn new() -> Self {
        Self::with_grace_period(CACHE_FAIL_GRACE)
    }

    /// Cache with a custom grace window. Mainly for tests that need the
    /// backoff to expire quickly.
    pub fn with_grace_period(grace: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            grace,
        }
    }

    /// Snapshot of the entry for `directory`, if any.
    pub fn lookup(&self, directory: &Path) -> Option<CacheEntry> {
        let entries = self.entries.lock().expect("resolution cache poisoned");
        entries.get(directory).cloned()
    }

    /// A fresh-valid entry can be served directly: same Makefile
    /// modification time and not a failure.
    pub fn is_valid_fresh(entry: &CacheEntry, current_modification: SystemTime) -> bool {
        entry.modification_time == current_modification && !entry.failed
    }

    /// A stale-valid entry is a cached failure still inside the grace
    /// window; it is replayed instead of retried.
    pub fn is_valid_stale(&self, entry: &CacheEntry, current_modification: SystemTime) -> bool {
        entry.modification_time == current_modification
            && entry.failed
            && SystemTime::now()
                .duration_since(entry.fail_time)
                .is_ok_and(|age| age < self.grace)
    }

    /// The failure result replayed for a stale-valid entry.
    ///
    /// The short message is prefixed so callers can tell a replayed
    /// failure from a live one; the cached fallback paths ride along.
    pub fn replay_failure(entry: &CacheEntry) -> ResolutionResult {
        let mut result = ResolutionResult::failure_with(
            format!("Cached: {}", entry.error_message),
            entry.long_error_message.clone(),
        );
        result.paths = entry.paths.clone();
        result
    }

    /// Upserts the outcome of a resolution attempt for `directory`.
    ///
    /// On success the failure state is cleared entirely. On failure the
    /// fail time restarts the grace window and `file` is recorded. In both
    /// cases the stored modification time only ever advances: a stale
    /// entry must not regress its notion of when the Makefile last
    /// changed.
    pub fn store(
        &self,
        directory: &Path,
        result: &ResolutionResult,
        modification_time: SystemTime,
        file: &str,
    ) {
        let mut entries = self.entries.lock().expect("resolution cache poisoned");
        let entry = entries
            .entry(directory.to_path_buf())
            .or_insert_with(|| CacheEntry {
                paths: Vec::new(),
                modification_time,
                failed: false,
                fail_time: SystemTime::UNIX_EPOCH,
                error_message: String::new(),
                long_error_message: String::new(),
                failed_files: HashSet::new(),
            });

        entry.paths = result.paths.clone();
        if entry.modification_time < modification_time {
            entry.modification_time = modification_time;
        }

        if result.success() {
            entry.failed = false;
            entry.error_message.clear();
            entry.long_error_message.clear();
            entry.failed_files.clear();
            tracing::debug!(
                target: "cache",
                "stored {} path(s) for {}",
                entry.paths.len(),
                directory.display()
            );
        } else {
            entry.failed = true;
            entry.fail_time = SystemTime::now();
            entry.error_message = result.error_message.clone();
            entry.long_error_message = result.long_error_message.clone();
            entry.failed_files.insert(file.to_string());
            tracing::debug!(
                target: "cache",
                "stored failure for {} ({})",
                directory.display(),
                result.error_message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtime(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn success(paths: &[&str]) -> ResolutionResult {
        ResolutionResult::ok(paths.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn fresh_entry_round_trips() {
        let cache = ResolutionCache::new();
        let dir = Path::new("/build");
        cache.store(dir, &success(&["/usr/include"]), mtime(100), "f.cpp");

        let entry = cache.lookup(dir).unwrap();
        assert!(ResolutionCache::is_valid_fresh(&entry, mtime(100)));
        assert!(!ResolutionCache::is_valid_fresh(&entry, mtime(101)));
        assert_eq!(entry.paths, vec![PathBuf::from("/usr/include")]);
    }

    #[test]
    fn failure_is_stale_valid_until_grace_expires() {
        let cache = ResolutionCache::with_grace_period(Duration::from_millis(40));
        let dir = Path::new("/build");
        cache.store(
            dir,
            &ResolutionResult::failure_with("Make process failed", "Output: boom"),
            mtime(100),
            "f.cpp",
        );

        let entry = cache.lookup(dir).unwrap();
        assert!(!ResolutionCache::is_valid_fresh(&entry, mtime(100)));
        assert!(cache.is_valid_stale(&entry, mtime(100)));
        // A different Makefile mtime invalidates even a recent failure.
        assert!(!cache.is_valid_stale(&entry, mtime(101)));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!cache.is_valid_stale(&entry, mtime(100)));
    }

    #[test]
    fn replayed_failure_is_marked_cached_and_keeps_fallback_paths() {
        let cache = ResolutionCache::new();
        let dir = Path::new("/build");
        cache.store(dir, &success(&["/old/include"]), mtime(100), "f.cpp");

        let mut failure = ResolutionResult::failure_with("Make process failed", "Output: boom");
        failure.paths = vec![PathBuf::from("/old/include")];
        cache.store(dir, &failure, mtime(100), "f.cpp");

        let entry = cache.lookup(dir).unwrap();
        let replay = ResolutionCache::replay_failure(&entry);
        assert!(!replay.success());
        assert_eq!(replay.error_message, "Cached: Make process failed");
        assert_eq!(replay.paths, vec![PathBuf::from("/old/include")]);
    }

    #[test]
    fn success_clears_failure_state() {
        let cache = ResolutionCache::new();
        let dir = Path::new("/build");
        cache.store(
            dir,
            &ResolutionResult::failure("Make process failed"),
            mtime(100),
            "a.cpp",
        );
        assert!(cache.lookup(dir).unwrap().failed);
        assert!(cache.lookup(dir).unwrap().failed_files.contains("a.cpp"));

        cache.store(dir, &success(&["/usr/include"]), mtime(100), "a.cpp");
        let entry = cache.lookup(dir).unwrap();
        assert!(!entry.failed);
        assert!(entry.failed_files.is_empty());
        assert!(entry.error_message.is_empty());
    }

    #[test]
    fn modification_time_never_regresses() {
        let cache = ResolutionCache::new();
        let dir = Path::new("/build");
        cache.store(dir, &success(&["/a"]), mtime(200), "f.cpp");
        cache.store(dir, &ResolutionResult::failure("Make process failed"), mtime(150), "f.cpp");

        let entry = cache.lookup(dir).unwrap();
        assert_eq!(entry.modification_time, mtime(200));
    }

    #[test]
    fn entries_are_per_directory() {
        let cache = ResolutionCache::new();
        cache.store(Path::new("/a"), &success(&["/ia"]), mtime(1), "f.cpp");
        cache.store(Path::new("/b"), &success(&["/ib"]), mtime(2), "g.cpp");
        assert_eq!(cache.lookup(Path::new("/a")).unwrap().paths, vec![PathBuf::from("/ia")]);
        assert_eq!(cache.lookup(Path::new("/b")).unwrap().paths, vec![PathBuf::from("/ib")]);
        assert!(cache.lookup(Path::new("/c")).is_none());
    }
}
