//! Mining include paths out of captured dry-run output.
//!
//! Two shapes of output are handled:
//! 1. a compiler line carrying the flags we are after (`-I<path>`,
//!    `-I <path>`, `--include-dir=<path>`), possibly quoted or with
//!    backslash-escaped spaces;
//! 2. a recursive make step (`cd /foo/bar && make -f sub.make sub/po.o`)
//!    that has to be followed into its own directory and retried there.
//!
//! The sub-patterns are named and kept separate so the matching rules stay
//! independently testable. All of this is deliberately stringly-typed;
//! build tools expose nothing better than their trace text.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::utils::fs::absolutize;

/// A path wrapped in single or double quotes, e.g. `'/opt/weird path'`.
const QUOTED_PATH: &str = r#"'[^']*'|"[^"]*""#;

/// An unquoted path whose spaces are backslash-escaped, e.g.
/// `/usr/I\ am\ a\ strange\ path/include`.
const ESCAPED_PATH: &str = r#"(?:\\ |[^\\\s'"()])+"#;

/// An include flag followed by either path form. The flag must sit at a
/// word start (beginning of output or after whitespace).
static INCLUDE_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?:^|\s)(?:-I ?|--include-dir=)({QUOTED_PATH}|{ESCAPED_PATH})"#
    ))
    .expect("include-flag pattern is valid")
});

/// A `make` invocation as a bare word.
static MAKE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmake\s").expect("make-call pattern is valid"));

/// Collapses backslash-newline continuation sequences into single logical
/// lines.
pub fn collapse_continuations(output: &str) -> String {
    output.replace("\\\n", "")
}

/// The first logical line of (already collapsed) output.
pub fn first_logical_line(output: &str) -> &str {
    output.lines().next().unwrap_or(output)
}

/// Whether any include-style flag appears anywhere in the output.
///
/// Used to suppress recursive-make following: kernel-module builds print a
/// nested make call *and* the flags, and the flags win.
pub fn contains_include_flag(output: &str) -> bool {
    INCLUDE_FLAG.is_match(output)
}

/// Outcome of scanning the first logical line for a recursive make step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MakeCall {
    /// No nested make invocation on the first line.
    None,
    /// A plain `cd <dir> && make <parameters>` (or bare `make`) step; the
    /// resolver should re-root at `directory` and retry with `parameters`.
    Recurse {
        /// New working directory, absolute and cleaned. When the prefix
        /// had no `cd`, this is the current working directory.
        directory: PathBuf,
        /// Trailing parameters handed to the nested make.
        parameters: String,
    },
    /// The nested make's parameters contain `;` or `&&` and cannot be
    /// safely re-issued.
    BadParameters {
        /// The rejected parameter string
        parameters: String,
    },
    /// Something other than an empty or `cd`-chain prefix precedes the
    /// make call.
    MalformedPrefix,
}

/// Scans `first_line` for a recursive make invocation.
///
/// The prefix before `make` must be empty or a command chain ending in
/// `&&`/`;`; the new working directory comes from the right-most `cd `
/// in that prefix (last one wins, handling `cd a && cd b`), made absolute
/// against `working_directory`. Existence of the directory is the
/// caller's business.
pub fn detect_recursive_make(first_line: &str, working_directory: &Path) -> MakeCall {
    let Some(found) = MAKE_CALL.find(first_line) else {
        return MakeCall::None;
    };

    let prefix = first_line[..found.start()].trim();
    if !(prefix.is_empty() || prefix.ends_with("&&") || prefix.ends_with(';')) {
        return MakeCall::MalformedPrefix;
    }

    let mut directory = working_directory.to_path_buf();
    if !prefix.is_empty() {
        let chain = prefix
            .strip_suffix("&&")
            .or_else(|| prefix.strip_suffix(';'))
            .unwrap_or(prefix);

        // Last `cd` wins: "cd a && cd b && make" re-roots at b.
        if let Some(cd_index) = chain.rfind("cd ") {
            let target = chain[cd_index + 3..].trim();
            directory = absolutize(Path::new(target), working_directory);
        }
    }

    let parameters = first_line[found.end()..].trim().to_string();
    if parameters.contains(';') || parameters.contains("&&") {
        return MakeCall::BadParameters { parameters };
    }

    MakeCall::Recurse {
        directory,
        parameters,
    }
}

/// Extracts every include path from `output`, in first-seen order.
///
/// Quotes are stripped, escaped spaces unescaped, relative paths made
/// absolute against `working_directory`, and every result lexically
/// cleaned. Duplicates are kept as produced.
pub fn extract_include_paths(output: &str, working_directory: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for caps in INCLUDE_FLAG.captures_iter(output) {
        let raw = &caps[1];
        let unquoted = strip_matching_quotes(raw);
        let unescaped = unquoted.replace("\\ ", " ");
        let path = absolutize(Path::new(unescaped.trim()), working_directory);
        paths.push(path);
    }
    paths
}

fn strip_matching_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'\'' || first == b'"') && bytes[bytes.len() - 1] == first {
            return &token[1..token.len() - 1];
        }
    }
    token
}
