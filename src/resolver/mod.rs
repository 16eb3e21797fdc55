//! The include-path resolver core.
//!
//! [`IncludePathResolver`] discovers the effective include search path of a
//! C/C++ translation unit by asking the build system what it *would* do:
//! it forces the file to look out of date, invokes a `make` dry-run,
//! follows recursive make steps, and mines the resulting command lines for
//! include flags. Results are cached per build directory with a failure
//! backoff window (see [`crate::cache`]).
//!
//! # Concurrency
//!
//! Any number of threads may resolve concurrently on *different* resolver
//! instances; they share one [`ResolutionCache`] behind its own mutex. On a
//! single instance only one resolution may be in flight: a second caller
//! gets an immediate "already resolving" failure rather than queueing.
//! Internal recursion (upward Makefile search, override-file sub-requests,
//! recursive-make following) runs below that single permit as a
//! continuation of the same request.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::ResolutionCache;
use crate::constants::{DEFAULT_MAX_STEPS_UP, MAKEFILE_NAME, OVERRIDE_FILE_NAME};
use crate::core::{ResolutionResult, ResolverError};
use crate::exec::{CommandRunner, ShellRunner};
use crate::extract::{
    MakeCall, collapse_continuations, contains_include_flag, detect_recursive_make,
    extract_include_paths, first_logical_line,
};
use crate::make::SourcePathInformation;
use crate::utils::fs::{absolutize, clean_path, modification_time, relative_from};
use crate::utils::mtime::FileTimeFaker;

/// Source-root to build-root substitution applied before Makefile lookup.
#[derive(Debug, Clone)]
struct BuildMapping {
    source: PathBuf,
    build: PathBuf,
}

/// Single-permit guard; released on every exit path.
struct ResolvePermit<'a>(&'a AtomicBool);

impl<'a> ResolvePermit<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ResolvePermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Resolves include search paths by driving non-destructive build-tool
/// dry-runs.
///
/// Owns (a share of) the process-wide [`ResolutionCache`] and a
/// [`CommandRunner`] collaborator. All failures come back as data inside
/// [`ResolutionResult`]; the resolution entry points never return `Err`.
pub struct IncludePathResolver {
    runner: Arc<dyn CommandRunner>,
    cache: Arc<ResolutionCache>,
    resolving: AtomicBool,
    mapping: Mutex<Option<BuildMapping>>,
}

impl Default for IncludePathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IncludePathResolver {
    /// Resolver with the production shell runner and its own cache.
    pub fn new() -> Self {
        Self::with_runner(Arc::new(ShellRunner::new()), Arc::new(ResolutionCache::new()))
    }

    /// Resolver with explicit collaborators. Pass a shared cache to keep
    /// the single-shared-cache contract across instances.
    pub fn with_runner(runner: Arc<dyn CommandRunner>, cache: Arc<ResolutionCache>) -> Self {
        Self {
            runner,
            cache,
            resolving: AtomicBool::new(false),
            mapping: Mutex::new(None),
        }
    }

    /// The cache this resolver stores results in.
    pub fn cache(&self) -> Arc<ResolutionCache> {
        Arc::clone(&self.cache)
    }

    /// Establishes a source-root to build-root mapping. Setting identical
    /// roots clears the mapping instead.
    pub fn set_out_of_source_build(&self, source: &Path, build: &Path) {
        if source == build {
            self.reset_out_of_source_build();
            return;
        }
        let mut mapping = self.mapping.lock().expect("mapping lock poisoned");
        *mapping = Some(BuildMapping {
            source: source.to_path_buf(),
            build: build.to_path_buf(),
        });
    }

    /// Clears the out-of-source mapping.
    pub fn reset_out_of_source_build(&self) {
        let mut mapping = self.mapping.lock().expect("mapping lock poisoned");
        *mapping = None;
    }

    /// Resolves the include path for `file`, using its parent directory as
    /// the working directory.
    pub async fn resolve(&self, file: &Path) -> ResolutionResult {
        let Some(name) = file.file_name() else {
            return ResolverError::MalformedFilename {
                file: file.display().to_string(),
            }
            .into();
        };
        let parent = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.resolve_in(Path::new(name), &parent).await
    }

    /// Resolves the include path for `file` relative to
    /// `working_directory`, with the default upward-search depth.
    pub async fn resolve_in(&self, file: &Path, working_directory: &Path) -> ResolutionResult {
        self.resolve_with_depth(file, working_directory, DEFAULT_MAX_STEPS_UP)
            .await
    }

    /// Resolves with an explicit bound on how many parent directories may
    /// be searched for a Makefile.
    pub async fn resolve_with_depth(
        &self,
        file: &Path,
        working_directory: &Path,
        max_steps_up: u32,
    ) -> ResolutionResult {
        let Some(_permit) = ResolvePermit::try_acquire(&self.resolving) else {
            return ResolverError::AlreadyResolving.into();
        };
        self.resolve_inner(
            file.to_path_buf(),
            working_directory.to_path_buf(),
            max_steps_up,
        )
        .await
    }

    fn map_to_build(&self, directory: &Path) -> PathBuf {
        let mapping = self.mapping.lock().expect("mapping lock poisoned");
        if let Some(m) = mapping.as_ref() {
            if directory.starts_with(&m.source) && !directory.starts_with(&m.build) {
                if let Ok(tail) = directory.strip_prefix(&m.source) {
                    return clean_path(&m.build.join(tail));
                }
            }
        }
        directory.to_path_buf()
    }

    fn has_mapping(&self) -> bool {
        self.mapping.lock().expect("mapping lock poisoned").is_some()
    }

    fn resolve_inner(
        &self,
        file: PathBuf,
        working_directory: PathBuf,
        max_steps_up: u32,
    ) -> BoxFuture<'_, ResolutionResult> {
        Box::pin(async move {
            // Make the working directory absolute first; everything later
            // keys off absolute paths.
            let working_directory = if working_directory.is_relative() {
                match std::env::current_dir() {
                    Ok(cwd) => absolutize(&working_directory, &cwd),
                    Err(err) => return ResolverError::from(err).into(),
                }
            } else {
                clean_path(&working_directory)
            };
            tracing::debug!(
                target: "resolver",
                "resolving {} in {}",
                file.display(),
                working_directory.display()
            );

            // A manual override file replaces automatic resolution.
            let override_file = working_directory.join(OVERRIDE_FILE_NAME);
            if override_file.exists() {
                return self
                    .resolve_from_override(&override_file, &file, &working_directory, max_steps_up)
                    .await;
            }

            let build_directory = self.map_to_build(&working_directory);

            let makefile = build_directory.join(MAKEFILE_NAME);
            if !makefile.exists() {
                // Step one directory up and retry from there; the stepped
                // over directory name is re-prepended to the file path.
                if max_steps_up > 0 && file.is_relative() {
                    if let (Some(parent), Some(local_name)) =
                        (working_directory.parent(), working_directory.file_name())
                    {
                        let stepped_file = Path::new(local_name).join(&file);
                        let one_up = self
                            .resolve_inner(stepped_file, parent.to_path_buf(), max_steps_up - 1)
                            .await;
                        if one_up.success() {
                            return one_up;
                        }
                    }
                }
                return ResolverError::MissingMakefile {
                    directory: build_directory,
                }
                .into();
            }

            let makefile_modification = match modification_time(&makefile) {
                Ok(t) => t,
                Err(err) => {
                    return ResolutionResult::failure_with(
                        "Could not read Makefile modification time",
                        format!("{err:#}"),
                    );
                }
            };

            // Cached paths survive into failures as a degraded fallback.
            let mut cached_paths = Vec::new();
            if let Some(entry) = self.cache.lookup(&build_directory) {
                cached_paths = entry.paths.clone();
                if ResolutionCache::is_valid_fresh(&entry, makefile_modification) {
                    tracing::debug!(
                        target: "resolver",
                        "cache hit for {}",
                        build_directory.display()
                    );
                    return ResolutionResult::ok(entry.paths);
                }
                if self.cache.is_valid_stale(&entry, makefile_modification) {
                    tracing::debug!(
                        target: "resolver",
                        "replaying cached failure for {}",
                        build_directory.display()
                    );
                    return ResolutionCache::replay_failure(&entry);
                }
            }

            let file_text = file.to_string_lossy();
            let Some(dot) = file_text.rfind('.') else {
                return ResolverError::MalformedFilename {
                    file: file_text.into_owned(),
                }
                .into();
            };
            let target_base = file_text[..dot].to_string();

            let absolute_file = absolutize(&file, &working_directory);

            let mut probe = SourcePathInformation::new(&build_directory);
            // Touch unconditionally: it costs one utimes pair and makes
            // `-W`-less setups work too.
            probe.set_should_touch_files(true);
            let targets = probe.possible_targets(&target_base);

            // First pass with the absolute file path.
            let mut result = ResolutionResult::default();
            for target in &targets {
                result = self
                    .resolve_step(
                        absolute_file.clone(),
                        build_directory.clone(),
                        target.clone(),
                        probe.clone(),
                    )
                    .await;
                if result.success() {
                    break;
                }
                tracing::debug!(
                    target: "resolver",
                    "target {target} failed: {}",
                    result.error_message
                );
            }
            if result.success() {
                self.cache
                    .store(&build_directory, &result, makefile_modification, &file_text);
                return result;
            }

            // Second pass with the path relative to the build directory;
            // which form works differs from setup to setup.
            let relative_file = relative_from(&build_directory, &absolute_file);
            for target in &targets {
                result = self
                    .resolve_step(
                        relative_file.clone(),
                        build_directory.clone(),
                        target.clone(),
                        probe.clone(),
                    )
                    .await;
                if result.success() {
                    break;
                }
            }

            if !result.success() && result.paths.is_empty() {
                result.paths = cached_paths;
            }
            self.cache
                .store(&build_directory, &result, makefile_modification, &file_text);
            result
        })
    }

    /// Parses a `.kdev_include_paths` file. Literal lines are appended
    /// verbatim; `RESOLVE: SOURCE=<s> BUILD=<b>` lines trigger a sub
    /// resolution under a temporary out-of-source mapping.
    async fn resolve_from_override(
        &self,
        override_file: &Path,
        file: &Path,
        working_directory: &Path,
        max_steps_up: u32,
    ) -> ResolutionResult {
        tracing::debug!(
            target: "resolver",
            "using override file {}",
            override_file.display()
        );
        let contents = match std::fs::read_to_string(override_file) {
            Ok(c) => c,
            Err(err) => {
                return ResolutionResult::failure_with(
                    "Make process failed",
                    format!("Could not read {}: {err}", override_file.display()),
                );
            }
        };

        let mut result = ResolutionResult::ok(Vec::new());
        for line in contents.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("RESOLVE:") && !self.has_mapping() {
                let Some((source, build)) = parse_resolve_directive(line) else {
                    continue;
                };
                if source == build {
                    continue;
                }
                tracing::debug!(
                    target: "resolver",
                    "override maps {} -> {}",
                    source.display(),
                    build.display()
                );
                self.set_out_of_source_build(&source, &build);

                // Re-append any directory components of the file to the
                // working directory before the sub-resolution.
                let components: Vec<_> = file.components().collect();
                let (sub_file, sub_directory, extra_steps) = if components.len() > 1 {
                    let mut dir = working_directory.to_path_buf();
                    for comp in &components[..components.len() - 1] {
                        dir.push(comp);
                    }
                    (
                        PathBuf::from(components[components.len() - 1].as_os_str()),
                        dir,
                        (components.len() - 1) as u32,
                    )
                } else {
                    (file.to_path_buf(), working_directory.to_path_buf(), 0)
                };

                let sub = self
                    .resolve_inner(sub_file, sub_directory, max_steps_up + extra_steps)
                    .await;
                if !sub.success() {
                    tracing::debug!(
                        target: "resolver",
                        "override sub-resolution failed: {}",
                        sub.error_message
                    );
                }
                result.paths.extend(sub.paths);

                self.reset_out_of_source_build();
            } else {
                result.paths.push(PathBuf::from(line));
            }
        }
        result
    }

    /// One dry-run attempt: touch, execute, follow recursive make or
    /// extract include flags.
    fn resolve_step(
        &self,
        file: PathBuf,
        working_directory: PathBuf,
        make_parameters: String,
        probe: SourcePathInformation,
    ) -> BoxFuture<'_, ResolutionResult> {
        Box::pin(async move {
            let file_text = file.to_string_lossy().into_owned();

            let touch_files = if probe.should_touch_files() {
                vec![file.clone()]
            } else {
                Vec::new()
            };
            // Held across the process execution; restores the original
            // modification times on every exit path.
            let _touch = FileTimeFaker::new(&touch_files, Some(&working_directory));

            let command = probe.dry_run_command(&file_text, &make_parameters);
            let output = match self.runner.run(&command, &working_directory).await {
                Ok(out) => out,
                Err(err) => return err.into(),
            };
            if !output.success {
                return ResolverError::ProcessFailed {
                    command,
                    output: output.output,
                }
                .into();
            }

            let full_output = collapse_continuations(&output.output);
            let first_line = first_logical_line(&full_output);

            // Kernel-module builds print a nested make call *and* the
            // flags; when flags are present anywhere they win.
            if !contains_include_flag(&full_output) {
                match detect_recursive_make(first_line, &working_directory) {
                    MakeCall::None => {}
                    MakeCall::MalformedPrefix => {
                        return ResolverError::MalformedRecursiveMake {
                            output: full_output,
                        }
                        .into();
                    }
                    MakeCall::BadParameters { parameters } => {
                        return ResolverError::RecursiveMakeBadParameters {
                            parameters,
                            output: full_output,
                        }
                        .into();
                    }
                    MakeCall::Recurse {
                        directory,
                        parameters,
                    } => {
                        if !directory.exists() {
                            return ResolverError::RecursiveMakeMissingDirectory {
                                directory,
                                output: full_output,
                            }
                            .into();
                        }
                        tracing::debug!(
                            target: "resolver",
                            "following recursive make into {}",
                            directory.display()
                        );
                        let absolute_file = absolutize(&file, &working_directory);
                        let sub_probe = SourcePathInformation::new(&directory);

                        let res = self
                            .resolve_step(
                                absolute_file.clone(),
                                directory.clone(),
                                parameters.clone(),
                                sub_probe.clone(),
                            )
                            .await;
                        if res.success() {
                            return res;
                        }
                        let relative_file = relative_from(&directory, &absolute_file);
                        return self
                            .resolve_step(relative_file, directory, parameters, sub_probe)
                            .await;
                    }
                }
            }

            let paths = extract_include_paths(&full_output, &working_directory);
            if paths.is_empty() {
                return ResolverError::NoIncludePaths {
                    directory: working_directory,
                    command,
                    output: full_output,
                }
                .into();
            }
            ResolutionResult::ok_with_output(paths, full_output)
        })
    }
}

/// Parses `RESOLVE:<ws>SOURCE=<s><ws>BUILD=<b>` into the two directories.
fn parse_resolve_directive(line: &str) -> Option<(PathBuf, PathBuf)> {
    let source_index = line.find(" SOURCE=")?;
    let rest = &line[source_index..];
    let build_offset = rest.find(" BUILD=")?;
    let source = rest[" SOURCE=".len()..build_offset].trim();
    let build = rest[build_offset + " BUILD=".len()..].trim();
    if source.is_empty() || build.is_empty() {
        return None;
    }
    Some((PathBuf::from(source), PathBuf::from(build)))
}
