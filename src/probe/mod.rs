//! Artifact probes
//!
//! Decides whether a usable installation is already present and satisfies the
//! required minimum version. Two strategies:
//! - compile (and run) a short program against the install prefix
//! - invoke a tool with a version flag and parse its output
//!
//! Probes never fail: every problem becomes `ProbeResult::Unsatisfied` with
//! the captured diagnostic as the reason.

mod command;
mod compile;

pub use command::probe_command;
pub use compile::probe_compile;

use crate::domain::{DependencySpec, ProbeDef, ProbeResult};
use crate::process::ProcessRunner;
use crate::workspace::Workspace;
use std::sync::Arc;
use tracing::debug;

/// Runs a dependency's probe against its install prefix
#[derive(Clone)]
pub struct ArtifactProbe {
    runner: Arc<dyn ProcessRunner>,
}

impl ArtifactProbe {
    /// Create a new probe using the given runner
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Probe the dependency and apply its version constraint
    pub async fn probe(&self, spec: &DependencySpec, workspace: &Workspace) -> ProbeResult {
        let prefix = workspace.install_prefix(spec);
        let result = match &spec.probe {
            ProbeDef::Compile(probe) => {
                probe_compile(self.runner.as_ref(), probe, Some(&prefix)).await
            }
            ProbeDef::Command(probe) => probe_command(self.runner.as_ref(), probe, &prefix).await,
        };
        let result = result.require(spec.min_version.as_ref());
        debug!(dependency = %spec.name, ?result, "probe finished");
        result
    }
}
