//! Scoped fake-modification of file times.
//!
//! `make -W` is not available on every build driver, so the resolver
//! sometimes has to make a source file *look* freshly modified to force the
//! dry-run to schedule its recompilation. [`FileTimeFaker`] is the scoped
//! resource for that: construction touches, drop restores — but only when
//! nothing else modified the file in between.

use std::fs::{File, FileTimes, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Records a file's original times, sets its modification time to "now",
/// and restores the original on drop if the faked time is still in place.
///
/// Restoration is conditional: if the file's modification time no longer
/// equals the faked value, someone saved a real change meanwhile and the
/// newer time is left untouched. Stat or set-time failures are logged and
/// skipped; they never abort the resolution that holds the faker.
pub struct FileTimeFaker {
    faked: Vec<FakedFile>,
    forced: SystemTime,
}

struct FakedFile {
    path: PathBuf,
    original_mtime: SystemTime,
}

impl FileTimeFaker {
    /// Touches every file in `files`, resolving relative paths against
    /// `working_directory` when given.
    pub fn new(files: &[PathBuf], working_directory: Option<&Path>) -> Self {
        let forced = SystemTime::now();
        let mut faked = Vec::with_capacity(files.len());

        for file in files {
            let path = match working_directory {
                Some(dir) if file.is_relative() => dir.join(file),
                _ => file.clone(),
            };
            tracing::trace!(target: "mtime", "touching {}", path.display());

            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::debug!(
                        target: "mtime",
                        "cannot stat {}, not touching: {err}",
                        path.display()
                    );
                    continue;
                }
            };
            let original_mtime = match meta.modified() {
                Ok(t) => t,
                Err(err) => {
                    tracing::debug!(
                        target: "mtime",
                        "no modification time for {}: {err}",
                        path.display()
                    );
                    continue;
                }
            };

            match set_file_times(&path, forced, forced) {
                Ok(()) => faked.push(FakedFile {
                    path,
                    original_mtime,
                }),
                Err(err) => {
                    tracing::debug!(
                        target: "mtime",
                        "failed to touch {}: {err}",
                        path.display()
                    );
                }
            }
        }

        Self { faked, forced }
    }

    /// The timestamp all touched files were set to.
    pub const fn forced_time(&self) -> SystemTime {
        self.forced
    }
}

impl Drop for FileTimeFaker {
    fn drop(&mut self) {
        for file in &self.faked {
            let current = match std::fs::metadata(&file.path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(err) => {
                    tracing::debug!(
                        target: "mtime",
                        "cannot re-stat {}, leaving times alone: {err}",
                        file.path.display()
                    );
                    continue;
                }
            };

            if current != self.forced {
                // A real modification landed while we held the fake time.
                tracing::debug!(
                    target: "mtime",
                    "not untouching {}, modification time has changed",
                    file.path.display()
                );
                continue;
            }

            let accessed = std::fs::metadata(&file.path)
                .and_then(|m| m.accessed())
                .unwrap_or(file.original_mtime);
            if let Err(err) = set_file_times(&file.path, accessed, file.original_mtime) {
                tracing::debug!(
                    target: "mtime",
                    "failed to untouch {}: {err}",
                    file.path.display()
                );
            } else {
                tracing::trace!(target: "mtime", "untouched {}", file.path.display());
            }
        }
    }
}

fn set_file_times(
    path: &Path,
    accessed: SystemTime,
    modified: SystemTime,
) -> std::io::Result<()> {
    // Append mode gives a writable handle without clobbering content.
    let file: File = OpenOptions::new().append(true).open(path)?;
    file.set_times(
        FileTimes::new()
            .set_accessed(accessed)
            .set_modified(modified),
    )
}
