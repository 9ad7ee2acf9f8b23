//! Host toolchain prerequisite gate
//!
//! Validates that required programs are on `PATH`, that versioned tools meet
//! their minimum, and that system libraries link. There is no fallback: any
//! failure is fatal and names the offending tool and actual version.

use crate::domain::{CompileProbe, ProbeLanguage, ProbeResult, VersionString};
use crate::error::PrereqError;
use crate::probe::probe_compile;
use crate::process::{CommandSpec, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Declared host requirements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisites {
    /// Programs that must be on `PATH`
    #[serde(default)]
    pub programs: Vec<String>,
    /// System libraries that must link (`-l<name>`)
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Minimum versions for tools, parsed from `<tool> --version`
    #[serde(default)]
    pub min_versions: BTreeMap<String, VersionString>,
}

impl Prerequisites {
    /// Returns true if nothing is required
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.libraries.is_empty() && self.min_versions.is_empty()
    }
}

/// Finds programs on the host
pub trait ProgramLocator: Send + Sync {
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Locator backed by `PATH` lookup
#[derive(Debug, Default)]
pub struct SystemLocator;

impl ProgramLocator for SystemLocator {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Checks `Prerequisites` against the host
pub struct PrereqChecker {
    runner: Arc<dyn ProcessRunner>,
    locator: Arc<dyn ProgramLocator>,
}

impl PrereqChecker {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_locator(runner, Arc::new(SystemLocator))
    }

    pub fn with_locator(runner: Arc<dyn ProcessRunner>, locator: Arc<dyn ProgramLocator>) -> Self {
        Self { runner, locator }
    }

    /// Run every check, stopping at the first failure
    pub async fn check(&self, prerequisites: &Prerequisites) -> Result<(), PrereqError> {
        for program in &prerequisites.programs {
            self.require_program(program)?;
        }

        for (tool, required) in &prerequisites.min_versions {
            let found = self.tool_version(tool).await?;
            if !found.satisfies(required) {
                return Err(PrereqError::ToolTooOld {
                    tool: tool.clone(),
                    found: found.to_string(),
                    required: required.to_string(),
                });
            }
            info!(tool = %tool, version = %found, "tool version ok");
        }

        for library in &prerequisites.libraries {
            let probe = CompileProbe {
                language: ProbeLanguage::C,
                libs: vec![library.clone()],
                ..Default::default()
            };
            if let ProbeResult::Unsatisfied(diagnostic) =
                probe_compile(self.runner.as_ref(), &probe, None).await
            {
                return Err(PrereqError::LibraryMissing {
                    library: library.clone(),
                    diagnostic,
                });
            }
            debug!(library = %library, "library links");
        }

        Ok(())
    }

    fn require_program(&self, program: &str) -> Result<PathBuf, PrereqError> {
        let path = self
            .locator
            .locate(program)
            .ok_or_else(|| PrereqError::ToolMissing {
                tool: program.to_string(),
            })?;
        debug!(program, path = %path.display(), "found program");
        Ok(path)
    }

    /// `<tool> --version`, parsed from the `version X.Y.Z` token
    async fn tool_version(&self, tool: &str) -> Result<VersionString, PrereqError> {
        let path = self.require_program(tool)?;
        let command = CommandSpec::new(path.display().to_string()).arg("--version");
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|_| PrereqError::ToolMissing {
                tool: tool.to_string(),
            })?;
        let combined = output.combined();
        if !output.success {
            return Err(PrereqError::UnparsableVersion {
                tool: tool.to_string(),
                output: combined,
            });
        }
        VersionString::extract_after_keyword(&combined).ok_or(PrereqError::UnparsableVersion {
            tool: tool.to_string(),
            output: combined,
        })
    }
}
