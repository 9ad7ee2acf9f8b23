//! extboot - Native build dependency resolver CLI tool
//!
//! Reads `extboot.toml`, checks host prerequisites, then resolves every
//! declared dependency in order: probe, fetch, build, install, re-probe.

use clap::Parser;
use extboot::cli::CliArgs;
use extboot::error::AppError;
use extboot::http::HttpClient;
use extboot::manifest::Manifest;
use extboot::output::{create_formatter, OutputConfig, StatusReporter};
use extboot::prereq::PrereqChecker;
use extboot::process::{ProcessRunner, SystemRunner};
use extboot::resolver::{Resolver, ResolverOptions};
use extboot::workspace::Workspace;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code when `--check` finds missing dependencies
const EXIT_MISSING: u8 = 2;

/// Exit code after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    // Run the main logic and handle errors
    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the log subscriber; `RUST_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Main application logic
async fn run(args: CliArgs) -> Result<ExitCode, AppError> {
    let manifest_path = args.manifest_path();
    let manifest = Manifest::load(&manifest_path)?;

    let unknown: Vec<String> = manifest
        .unknown_names(&args.only)
        .into_iter()
        .chain(manifest.unknown_names(&args.exclude))
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::UnknownDependency { names: unknown });
    }
    let specs = manifest.select(&args.only, &args.exclude);

    if args.verbose {
        eprintln!("extboot v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Manifest: {}", manifest_path.display());
        eprintln!("Dependencies: {}", specs.len());
        if args.check {
            eprintln!("Mode: check");
        }
    }

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());

    if !args.no_prereqs && !manifest.prerequisites.is_empty() {
        PrereqChecker::new(Arc::clone(&runner))
            .check(&manifest.prerequisites)
            .await?;
    }

    let workspace = Workspace::new(manifest.workspace_root(&args.path))?;
    let output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet);
    let options = ResolverOptions {
        check_only: args.check,
        skip_optional: args.skip_optional,
        jobs: args.jobs(),
    };

    let mut resolver = Resolver::new(workspace, runner, Arc::new(HttpClient::new()?))
        .with_options(options);
    if !args.json {
        resolver = resolver.with_observer(Arc::new(StatusReporter::new(
            output_config.verbosity,
            args.show_status(),
        )));
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = resolver.resolve_all_until(&specs, shutdown).await;

    let formatter = create_formatter(output_config);
    if report.error.is_some() && !args.json {
        let mut stderr = io::stderr().lock();
        formatter.format(&report, &mut stderr)?;
        stderr.flush()?;
    } else {
        let mut stdout = io::stdout().lock();
        formatter.format(&report, &mut stdout)?;
        stdout.flush()?;
    }

    // Return appropriate exit code
    if report.was_interrupted() {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else if report.error.is_some() {
        Ok(ExitCode::FAILURE)
    } else if report.missing().next().is_some() {
        Ok(ExitCode::from(EXIT_MISSING))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
