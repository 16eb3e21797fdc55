//! incpath CLI entry point
//!
//! Resolves the include search path for one source file and prints it,
//! one directory per line. Mirrors the resolver's debugging front end:
//! file, optional working directory, optional out-of-source mapping.

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use incpath::constants::DEFAULT_MAX_STEPS_UP;
use incpath::resolver::IncludePathResolver;

#[derive(Parser)]
#[command(
    name = "incpath",
    version,
    about = "Resolve C/C++ include search paths by driving make dry-runs"
)]
struct Cli {
    /// Source file to resolve include paths for
    file: PathBuf,

    /// Working directory (defaults to the file's parent directory)
    working_directory: Option<PathBuf>,

    /// Source root of an out-of-source build (requires --build-dir)
    #[arg(long, requires = "build_dir")]
    source_dir: Option<PathBuf>,

    /// Build root of an out-of-source build (requires --source-dir)
    #[arg(long, requires = "source_dir")]
    build_dir: Option<PathBuf>,

    /// How many parent directories to search for a Makefile
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS_UP)]
    max_steps_up: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let resolver = IncludePathResolver::new();
    if let (Some(source), Some(build)) = (&cli.source_dir, &cli.build_dir) {
        resolver.set_out_of_source_build(source, build);
    }

    let result = match &cli.working_directory {
        Some(dir) => {
            resolver
                .resolve_with_depth(&cli.file, dir, cli.max_steps_up)
                .await
        }
        None => resolver.resolve(&cli.file).await,
    };

    for path in &result.paths {
        println!("{}", path.display());
    }

    if !result.success() {
        eprintln!("{} {}", "error:".red().bold(), result.error_message);
        if !result.long_error_message.is_empty() {
            eprintln!("{}", result.long_error_message.dimmed());
        }
        std::process::exit(1);
    }
}
