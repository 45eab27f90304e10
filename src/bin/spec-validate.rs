//! Schema Reference Validator CLI
//!
//! Finds documents by glob, validates each against the schema named in its
//! `$schema` field, and reports per-file results. Every option can also be
//! supplied through the job runner's `INPUT_*` environment variables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use spec_validate::{
    discover, write_status, CompileOptions, ConsoleReporter, MirrorFetcher, OfflineFetcher,
    RunError, RunSummary, SchemaFetcher, SchemaRegistry, ValidationRunner, ValidatorCompiler,
    DEFAULT_PATTERN,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spec-validate")]
#[command(about = "Validate JSON documents against the schema named in their $schema field")]
#[command(version)]
struct Cli {
    /// Glob patterns selecting documents (newline-separated in the environment)
    #[arg(long = "pattern", env = "INPUT_PATTERNS", value_delimiter = '\n', default_value = DEFAULT_PATTERN)]
    patterns: Vec<String>,

    /// Glob patterns of documents to skip
    #[arg(long, env = "INPUT_EXCLUDE", value_delimiter = '\n')]
    exclude: Vec<String>,

    /// Strict mode: unknown formats are schema compilation errors
    #[arg(long, env = "INPUT_STRICT")]
    strict: bool,

    /// Append validated=<n> and failed=<n> lines to this file
    #[arg(long, env = "GITHUB_OUTPUT")]
    status_file: Option<PathBuf>,

    /// URL prefix served from --schema-local-base instead of the network
    #[arg(long, env = "INPUT_SCHEMA_REMOTE_BASE", requires = "schema_local_base")]
    schema_remote_base: Option<String>,

    /// Local directory mirroring --schema-remote-base
    #[arg(long, env = "INPUT_SCHEMA_LOCAL_BASE")]
    schema_local_base: Option<PathBuf>,

    /// Directory patterns are evaluated against
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Unexpected error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary, RunError> {
    let mut patterns = clean(cli.patterns);
    if patterns.is_empty() {
        patterns.push(DEFAULT_PATTERN.to_string());
    }
    let exclude = clean(cli.exclude);

    let files = discover(&cli.root, &patterns, &exclude)?;

    let fetcher = build_fetcher(cli.schema_remote_base, cli.schema_local_base);
    let compiler = ValidatorCompiler::new(Arc::new(SchemaRegistry::new()), fetcher)
        .with_options(CompileOptions::new().strict(cli.strict));
    let runner = ValidationRunner::new(compiler).with_root(&cli.root);

    let summary = runner.run(&files, &mut ConsoleReporter::stdout()).await?;

    if let Some(path) = &cli.status_file {
        write_status(path, &summary)?;
    }
    Ok(summary)
}

/// Trim entries and drop blank lines.
fn clean(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn build_fetcher(
    remote_base: Option<String>,
    local_base: Option<PathBuf>,
) -> Arc<dyn SchemaFetcher> {
    let network = network_fetcher();
    match (remote_base, local_base) {
        (Some(remote_base), Some(local_base)) => {
            Arc::new(MirrorFetcher::new(remote_base, local_base, network))
        }
        _ => network,
    }
}

#[cfg(feature = "remote")]
fn network_fetcher() -> Arc<dyn SchemaFetcher> {
    match spec_validate::HttpFetcher::new() {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            tracing::warn!(error = %e, "HTTP client unavailable, remote schemas disabled");
            Arc::new(OfflineFetcher)
        }
    }
}

#[cfg(not(feature = "remote"))]
fn network_fetcher() -> Arc<dyn SchemaFetcher> {
    Arc::new(OfflineFetcher)
}
