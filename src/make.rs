//! Per-directory facts about the build system in a working directory.
//!
//! The resolver drives plain `make` by default. The one legacy variant it
//! knows about is unsermake, detected by a signature string in the first
//! line of the generated Makefile. unsermake differs in two ways that
//! matter here:
//! 1. it has no `-W` flag, so forcing recompilation requires faking the
//!    source file's modification time and passing `--no-real-compare`;
//! 2. its targets are named `*.lo` rather than `*.o`, so the candidate
//!    target order is flipped.
//!
//! Both command templates carry the dry-run flag (`-n`): the probe never
//! requests a real build.

use std::path::{Path, PathBuf};

use crate::constants::{MAKEFILE_NAME, MAKEFILE_SNIFF_LEN};
use crate::utils::fs::read_first_line;

/// Signature written by unsermake into the first line of its Makefiles.
const UNSERMAKE_SIGNATURE: &str = "generated by unsermake";

/// Build-tool characterization of one working directory.
///
/// Constructed once per directory; the Makefile sniff happens at
/// construction time and is the only filesystem access.
#[derive(Debug, Clone)]
pub struct SourcePathInformation {
    path: PathBuf,
    is_unsermake: bool,
    should_touch_files: bool,
}

impl SourcePathInformation {
    /// Probes `path` for its build tooling.
    pub fn new(path: &Path) -> Self {
        let is_unsermake = detect_unsermake(path);
        if is_unsermake {
            tracing::debug!(target: "make", "unsermake detected in {}", path.display());
        }
        Self {
            path: path.to_path_buf(),
            is_unsermake,
            should_touch_files: false,
        }
    }

    /// Whether the legacy unsermake driver generated this Makefile.
    pub const fn is_unsermake(&self) -> bool {
        self.is_unsermake
    }

    /// Forces file-time faking regardless of the detected variant.
    pub fn set_should_touch_files(&mut self, touch: bool) {
        self.should_touch_files = touch;
    }

    /// Whether the source file's modification time must be faked before
    /// the dry-run. Always true for unsermake.
    pub const fn should_touch_files(&self) -> bool {
        self.is_unsermake || self.should_touch_files
    }

    /// The shell command requesting a dry-run build trace for
    /// `source_file` with the given trailing make parameters.
    pub fn dry_run_command(&self, source_file: &str, make_parameters: &str) -> String {
        if self.is_unsermake() {
            format!("unsermake -k --no-real-compare -n {make_parameters}")
        } else {
            format!("make -k --no-print-directory -W '{source_file}' -n {make_parameters}")
        }
    }

    /// Whether a build-control file exists in this directory.
    pub fn has_makefile(&self) -> bool {
        self.path.join(MAKEFILE_NAME).exists()
    }

    /// Candidate object-file target names for `target_base_name`, in the
    /// order they must be tried.
    ///
    /// unsermake breaks when the first given target does not exist, so the
    /// historically more likely `.lo` goes first there; plain make prefers
    /// `.o`. A `.ko` kernel-module candidate is always appended last.
    pub fn possible_targets(&self, target_base_name: &str) -> Vec<String> {
        let mut targets = if self.is_unsermake() {
            vec![
                format!("{target_base_name}.lo"),
                format!("{target_base_name}.o"),
            ]
        } else {
            vec![
                format!("{target_base_name}.o"),
                format!("{target_base_name}.lo"),
            ]
        };
        targets.push(format!("{target_base_name}.ko"));
        targets
    }
}

fn detect_unsermake(path: &Path) -> bool {
    match read_first_line(&path.join(MAKEFILE_NAME), MAKEFILE_SNIFF_LEN) {
        Ok(first_line) => first_line.contains(UNSERMAKE_SIGNATURE),
        // No Makefile (or unreadable) simply means "not unsermake".
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_with(first_line: &str) -> (tempfile::TempDir, SourcePathInformation) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), format!("{first_line}\nall:\n")).unwrap();
        let probe = SourcePathInformation::new(dir.path());
        (dir, probe)
    }

    #[test]
    fn plain_make_is_default() {
        let (_dir, probe) = probe_with("# CMAKE generated file");
        assert!(!probe.is_unsermake());
        assert!(probe.has_makefile());
        assert_eq!(
            probe.dry_run_command("sub/foo.cpp", "foo.o"),
            "make -k --no-print-directory -W 'sub/foo.cpp' -n foo.o"
        );
    }

    #[test]
    fn unsermake_signature_switches_variant() {
        let (_dir, probe) = probe_with("# generated by unsermake 0.4");
        assert!(probe.is_unsermake());
        assert!(probe.should_touch_files());
        assert_eq!(
            probe.dry_run_command("foo.cpp", "foo.lo"),
            "unsermake -k --no-real-compare -n foo.lo"
        );
    }

    #[test]
    fn missing_makefile_is_not_unsermake() {
        let dir = tempfile::tempdir().unwrap();
        let probe = SourcePathInformation::new(dir.path());
        assert!(!probe.is_unsermake());
        assert!(!probe.has_makefile());
    }

    #[test]
    fn target_order_depends_on_variant() {
        let (_dir, make) = probe_with("all:");
        assert_eq!(make.possible_targets("foo"), vec!["foo.o", "foo.lo", "foo.ko"]);

        let (_dir, unser) = probe_with("# generated by unsermake");
        assert_eq!(unser.possible_targets("foo"), vec!["foo.lo", "foo.o", "foo.ko"]);
    }

    #[test]
    fn touch_can_be_forced_for_plain_make() {
        let (_dir, mut probe) = probe_with("all:");
        assert!(!probe.should_touch_files());
        probe.set_should_touch_files(true);
        assert!(probe.should_touch_files());
    }
}
