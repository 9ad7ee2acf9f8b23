//! CLI argument parsing module for extboot

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Parse a job count; zero is rejected
fn parse_jobs(s: &str) -> Result<usize, String> {
    let jobs: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid job count: {}", s))?;
    if jobs == 0 {
        return Err("job count must be at least 1".to_string());
    }
    Ok(jobs)
}

/// Native build dependency resolver
#[derive(Parser, Debug, Clone)]
#[command(
    name = "extboot",
    version,
    about = "Probe, fetch, build and install native build dependencies into a local workspace"
)]
pub struct CliArgs {
    /// Project directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Manifest file (default: <path>/extboot.toml)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    // General options
    /// Enable verbose output (debug logging)
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,

    // Dependency filters
    /// Resolve only these dependencies (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Skip these dependencies (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Skip dependencies marked optional (e.g. test frameworks)
    #[arg(long)]
    pub skip_optional: bool,

    // Mode options
    /// Probe only: report missing dependencies without fetching or building
    #[arg(long)]
    pub check: bool,

    /// Skip the host toolchain prerequisite check
    #[arg(long)]
    pub no_prereqs: bool,

    /// Parallel build jobs (default: number of logical cores)
    #[arg(short, long, value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,
}

impl CliArgs {
    /// Manifest path, defaulting to `<path>/extboot.toml`
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.path.join(crate::manifest::DEFAULT_MANIFEST))
    }

    /// Job count, defaulting to the host's logical core count
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get)
    }

    /// Whether live status lines and spinners should be shown
    pub fn show_status(&self) -> bool {
        !self.quiet && !self.json
    }
}
