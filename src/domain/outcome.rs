//! Outcome types for probes, builds and whole-dependency resolution

use super::VersionString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage that can fail fatally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Configure,
    Compile,
    Install,
}

impl Stage {
    /// Lowercase stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Configure => "configure",
            Stage::Compile => "compile",
            Stage::Install => "install",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing an installation
///
/// Probe failures of every kind (compile error, run error, missing files,
/// unparsable output, version too low) collapse to `Unsatisfied`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// A usable artifact exists; the version is `None` for link-only probes
    Satisfied(Option<VersionString>),
    /// No usable artifact, with the captured diagnostic
    Unsatisfied(String),
}

impl ProbeResult {
    /// Creates an Unsatisfied result
    pub fn unsatisfied(reason: impl Into<String>) -> Self {
        ProbeResult::Unsatisfied(reason.into())
    }

    /// Returns true if the probe succeeded
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ProbeResult::Satisfied(_))
    }

    /// Applies a minimum version constraint to a satisfied result
    pub fn require(self, minimum: Option<&VersionString>) -> Self {
        let Some(minimum) = minimum else {
            return self;
        };
        match self {
            ProbeResult::Satisfied(Some(found)) if found.satisfies(minimum) => {
                ProbeResult::Satisfied(Some(found))
            }
            ProbeResult::Satisfied(Some(found)) => ProbeResult::Unsatisfied(format!(
                "found version {}, requires >= {}",
                found, minimum
            )),
            ProbeResult::Satisfied(None) => ProbeResult::Unsatisfied(format!(
                "no version reported, requires >= {}",
                minimum
            )),
            unsatisfied => unsatisfied,
        }
    }
}

/// Outcome of running a build recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// All stages completed and the prefix was populated
    Installed(PathBuf),
    /// A stage failed; later stages were not run
    Failed {
        stage: Stage,
        cause: String,
        diagnostic: String,
    },
}

impl BuildOutcome {
    /// Creates a Failed outcome
    pub fn failed(stage: Stage, cause: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        BuildOutcome::Failed {
            stage,
            cause: cause.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// How a dependency ended up resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionAction {
    /// An existing installation passed the probe
    Found,
    /// Fetched, built, installed and re-verified
    Built,
    /// Check-only mode: the probe failed and nothing was built
    Missing { reason: String },
    /// Optional dependency skipped on request
    Skipped,
}

/// Result of resolving one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionString>,
    pub prefix: PathBuf,
    #[serde(flatten)]
    pub action: ResolutionAction,
}

impl Resolution {
    /// Creates a new resolution record
    pub fn new(
        name: impl Into<String>,
        version: Option<VersionString>,
        prefix: impl Into<PathBuf>,
        action: ResolutionAction,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            prefix: prefix.into(),
            action,
        }
    }

    /// Returns true if the dependency is usable after resolution
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.action,
            ResolutionAction::Found | ResolutionAction::Built
        )
    }
}
