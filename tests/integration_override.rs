//! Manual override files, out-of-source RESOLVE directives, and the
//! single-resolution-per-instance guard.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use incpath::cache::ResolutionCache;
use incpath::core::ResolverError;
use incpath::exec::{CommandOutput, CommandRunner};
use incpath::resolver::IncludePathResolver;
use incpath::test_utils::MockRunner;

#[tokio::test]
async fn literal_override_lines_win_over_everything() {
    let dir = tempfile::tempdir().unwrap();
    // Makefile present but it must not be consulted.
    std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
    std::fs::write(
        dir.path().join(".kdev_include_paths"),
        "/usr/include/foo\n\n/opt/bar/include\n",
    )
    .unwrap();

    let runner = Arc::new(MockRunner::new());
    let resolver =
        IncludePathResolver::with_runner(runner.clone(), Arc::new(ResolutionCache::new()));

    let result = resolver.resolve_in(Path::new("foo.cpp"), dir.path()).await;

    assert!(result.success());
    assert_eq!(
        result.paths,
        vec![
            PathBuf::from("/usr/include/foo"),
            PathBuf::from("/opt/bar/include"),
        ]
    );
    assert_eq!(runner.call_count(), 0, "override replaces automatic resolution");
}

#[tokio::test]
async fn resolve_directive_maps_into_the_build_tree() {
    let source = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    let source_sub = source.path().join("sub");
    let build_sub = build.path().join("sub");
    std::fs::create_dir_all(&source_sub).unwrap();
    std::fs::create_dir_all(&build_sub).unwrap();
    std::fs::write(build_sub.join("Makefile"), "all:\n").unwrap();
    std::fs::write(
        source.path().join(".kdev_include_paths"),
        format!(
            "RESOLVE: SOURCE={} BUILD={}\n/literal/include\n",
            source.path().display(),
            build.path().display()
        ),
    )
    .unwrap();

    let runner = Arc::new(MockRunner::new());
    runner.push_output("gcc -I/usr/include -c foo.cpp");
    let resolver =
        IncludePathResolver::with_runner(runner.clone(), Arc::new(ResolutionCache::new()));

    // The file's own directory has no Makefile and no override file; the
    // upward search reaches the source root where the directive lives.
    let result = resolver.resolve_in(Path::new("foo.cpp"), &source_sub).await;

    assert!(result.success(), "{}", result.error_message);
    assert_eq!(
        result.paths,
        vec![PathBuf::from("/usr/include"), PathBuf::from("/literal/include")]
    );
    assert_eq!(runner.calls()[0].working_directory, build_sub);
    // The mapping established by the directive is reset afterwards.
    let unmapped = resolver
        .resolve_with_depth(Path::new("bar.cpp"), build.path(), 0)
        .await;
    assert!(!unmapped.success());
    assert!(unmapped.error_message.contains("Makefile is missing"));
}

/// Runner that parks its first invocation until released, so a test can
/// observe an in-flight resolution.
struct GatedRunner {
    started: tokio::sync::Notify,
    release: tokio::sync::Notify,
    calls: AtomicUsize,
}

impl GatedRunner {
    fn new() -> Self {
        Self {
            started: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl CommandRunner for GatedRunner {
    fn run<'a>(
        &'a self,
        _command: &'a str,
        _working_directory: &'a Path,
    ) -> BoxFuture<'a, Result<CommandOutput, ResolverError>> {
        Box::pin(async move {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(CommandOutput {
                success: true,
                output: "gcc -I/usr/include -c foo.cpp\n".to_string(),
            })
        })
    }
}

#[tokio::test]
async fn concurrent_resolution_on_one_instance_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
    std::fs::write(dir.path().join("foo.cpp"), "").unwrap();

    let runner = Arc::new(GatedRunner::new());
    let resolver = Arc::new(IncludePathResolver::with_runner(
        runner.clone(),
        Arc::new(ResolutionCache::new()),
    ));

    let background = {
        let resolver = Arc::clone(&resolver);
        let path = dir.path().to_path_buf();
        tokio::spawn(async move { resolver.resolve_in(Path::new("foo.cpp"), &path).await })
    };

    runner.started.notified().await;

    let concurrent = resolver.resolve_in(Path::new("foo.cpp"), dir.path()).await;
    assert!(!concurrent.success());
    assert!(concurrent.error_message.contains("still running"));

    runner.release.notify_one();
    let first = background.await.unwrap();
    assert!(first.success(), "{}", first.error_message);
    assert_eq!(first.paths, vec![PathBuf::from("/usr/include")]);
}

#[tokio::test]
async fn independent_instances_share_one_cache() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();

    let cache = Arc::new(ResolutionCache::new());
    let runner_a = Arc::new(MockRunner::new());
    runner_a.push_output("gcc -I/usr/include -c foo.cpp");
    let resolver_a = IncludePathResolver::with_runner(runner_a.clone(), Arc::clone(&cache));
    let runner_b = Arc::new(MockRunner::new());
    let resolver_b = IncludePathResolver::with_runner(runner_b.clone(), Arc::clone(&cache));

    let first = resolver_a.resolve_in(Path::new("foo.cpp"), dir.path()).await;
    assert!(first.success());

    let second = resolver_b.resolve_in(Path::new("foo.cpp"), dir.path()).await;
    assert!(second.success());
    assert_eq!(second.paths, first.paths);
    assert_eq!(runner_b.call_count(), 0, "second instance must hit the shared cache");
}
