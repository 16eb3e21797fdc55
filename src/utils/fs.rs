//! Path and filesystem helpers used by the resolver.
//!
//! Everything here is lexical where it can be: the resolver reasons about
//! paths reported in build-tool output, which frequently name directories
//! relative to a working directory that is *not* the process's own, so
//! symlink-resolving canonicalization would change meaning. Cleaning only
//! folds `.` and `..` components.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Lexically normalizes a path by folding `.` and `..` components.
///
/// Does not touch the filesystem. `..` at the root is dropped; `..` at the
/// start of a relative path is kept. An input that folds away entirely
/// becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(comp),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Makes `path` absolute against `base` (itself expected absolute), then
/// cleans the result.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        clean_path(path)
    } else {
        clean_path(&base.join(path))
    }
}

/// Computes the path of `target` relative to `base`.
///
/// Both inputs should be absolute; if either is not, `target` is returned
/// unchanged. Mirrors what the build tool itself would print for a file
/// referenced from another directory.
pub fn relative_from(base: &Path, target: &Path) -> PathBuf {
    if !base.is_absolute() || !target.is_absolute() {
        return target.to_path_buf();
    }
    let base = clean_path(base);
    let target = clean_path(target);

    let base_comps: Vec<Component> = base.components().collect();
    let target_comps: Vec<Component> = target.components().collect();

    let mut common = 0;
    while common < base_comps.len()
        && common < target_comps.len()
        && base_comps[common] == target_comps[common]
    {
        common += 1;
    }

    let mut rel = PathBuf::new();
    for _ in common..base_comps.len() {
        rel.push("..");
    }
    for comp in &target_comps[common..] {
        rel.push(comp.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Reads at most `max_len` bytes from the start of `path` and returns the
/// first line, lossily decoded.
///
/// Used to sniff build-control files for tool signatures without pulling a
/// potentially huge generated Makefile into memory.
pub fn read_first_line(path: &Path, max_len: usize) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for sniffing", path.display()))?;
    let mut buf = vec![0u8; max_len];
    let mut read = 0;
    while read < max_len {
        let n = file
            .read(&mut buf[read..])
            .with_context(|| format!("Failed to read from {}", path.display()))?;
        if n == 0 {
            break;
        }
        read += n;
    }
    buf.truncate(read);
    let text = String::from_utf8_lossy(&buf);
    Ok(text.lines().next().unwrap_or_default().to_string())
}

/// Modification time of `path`.
pub fn modification_time(path: &Path) -> Result<SystemTime> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    meta.modified()
        .with_context(|| format!("Modification time unavailable for {}", path.display()))
}
