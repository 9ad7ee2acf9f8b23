//! Resolver state machine for native dependencies
//!
//! This module provides:
//! - Per-dependency pipeline: probe → fetch → build → install → reprobe
//! - Declaration-order driver that stops at the first fatal failure
//! - Check-only mode (probe and report, never fetch or build)
//! - Interruption: the running pipeline is dropped, which kills its child process

use crate::acquire::SourceAcquirer;
use crate::domain::{
    BuildOutcome, DependencySpec, ProbeResult, Resolution, ResolutionAction, Stage, VersionString,
};
use crate::error::ResolveError;
use crate::http::Fetcher;
use crate::probe::ArtifactProbe;
use crate::process::ProcessRunner;
use crate::recipe::{create_recipe, BuildContext, RecipeExecutor};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Resolver behaviour switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Probe only; report unsatisfied dependencies as missing
    pub check_only: bool,
    /// Skip dependencies marked `optional`
    pub skip_optional: bool,
    /// Parallel job count for build tools
    pub jobs: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            check_only: false,
            skip_optional: false,
            jobs: num_cpus::get(),
        }
    }
}

/// Where a dependency's pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Probing,
    Fetching,
    Building(Stage),
    Reprobing,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveState::Probing => f.write_str("probing"),
            ResolveState::Fetching => f.write_str("fetching"),
            ResolveState::Building(stage) => write!(f, "building ({})", stage),
            ResolveState::Reprobing => f.write_str("verifying the build"),
        }
    }
}

/// Progress notifications emitted while resolving
#[derive(Debug)]
pub enum ResolveEvent<'a> {
    /// Probing is about to start
    Checking(&'a DependencySpec),
    /// The existing installation passed the probe
    Found {
        spec: &'a DependencySpec,
        version: Option<&'a VersionString>,
    },
    /// The probe failed; a build follows unless in check-only mode
    NotFound {
        spec: &'a DependencySpec,
        reason: &'a str,
    },
    /// Source acquisition is starting
    Fetching(&'a DependencySpec),
    /// The build is starting
    Building {
        spec: &'a DependencySpec,
        prefix: &'a Path,
    },
    /// A build stage is starting
    Stage {
        spec: &'a DependencySpec,
        stage: Stage,
    },
    /// The built artifact passed the probe
    Built {
        spec: &'a DependencySpec,
        version: Option<&'a VersionString>,
    },
    /// Optional dependency skipped
    Skipped(&'a DependencySpec),
    /// The pipeline failed fatally
    Failed {
        spec: &'a DependencySpec,
        error: &'a ResolveError,
    },
}

/// Receives resolver events (status lines, spinners)
pub trait ResolveObserver: Send + Sync {
    fn on_event(&self, event: &ResolveEvent<'_>);
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {
    fn on_event(&self, _event: &ResolveEvent<'_>) {}
}

/// Result of resolving a list of dependencies
#[derive(Debug)]
pub struct ResolveReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Completed resolutions, in declaration order
    pub resolutions: Vec<Resolution>,
    /// The fatal failure that stopped the run, if any
    pub error: Option<ResolveError>,
}

impl ResolveReport {
    /// True when every dependency is usable and nothing failed
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self
                .resolutions
                .iter()
                .all(|r| r.is_resolved() || r.action == ResolutionAction::Skipped)
    }

    /// Dependencies reported missing in check-only mode
    pub fn missing(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions
            .iter()
            .filter(|r| matches!(r.action, ResolutionAction::Missing { .. }))
    }

    /// Whether the run was stopped by an interruption
    pub fn was_interrupted(&self) -> bool {
        matches!(self.error, Some(ResolveError::Interrupted { .. }))
    }
}

/// Drives dependencies through the resolution pipeline
pub struct Resolver {
    workspace: Workspace,
    probe: ArtifactProbe,
    acquirer: SourceAcquirer,
    executor: RecipeExecutor,
    options: ResolverOptions,
    observer: Arc<dyn ResolveObserver>,
}

impl Resolver {
    /// Create a resolver over `workspace` using the given process runner and fetcher
    pub fn new(
        workspace: Workspace,
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            workspace,
            probe: ArtifactProbe::new(Arc::clone(&runner)),
            acquirer: SourceAcquirer::new(Arc::clone(&runner), fetcher),
            executor: RecipeExecutor::new(runner),
            options: ResolverOptions::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set resolver options (builder pattern)
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the event observer (builder pattern)
    pub fn with_observer(mut self, observer: Arc<dyn ResolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The workspace this resolver operates on
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Resolve a single dependency
    pub async fn resolve(&self, spec: &DependencySpec) -> Result<Resolution, ResolveError> {
        let state = Mutex::new(ResolveState::Probing);
        self.run_pipeline(spec, &state).await
    }

    /// Resolve every dependency in declaration order
    pub async fn resolve_all(&self, specs: &[DependencySpec]) -> ResolveReport {
        self.resolve_all_until(specs, std::future::pending()).await
    }

    /// Resolve every dependency in declaration order until `shutdown` completes
    ///
    /// The first fatal failure stops the run; dependencies after it are not
    /// attempted. When `shutdown` fires, the in-flight pipeline is dropped and
    /// reported as `ResolveError::Interrupted`.
    pub async fn resolve_all_until<F>(&self, specs: &[DependencySpec], shutdown: F) -> ResolveReport
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let mut resolutions = Vec::new();
        let mut error = None;
        tokio::pin!(shutdown);

        for spec in specs {
            if spec.optional && self.options.skip_optional {
                info!(dependency = %spec.name, "skipping optional dependency");
                self.observer.on_event(&ResolveEvent::Skipped(spec));
                resolutions.push(Resolution::new(
                    &spec.name,
                    None,
                    self.workspace.install_prefix(spec),
                    ResolutionAction::Skipped,
                ));
                continue;
            }

            let state = Mutex::new(ResolveState::Probing);
            let outcome = tokio::select! {
                result = self.run_pipeline(spec, &state) => result,
                _ = &mut shutdown => {
                    let state = *state.lock().unwrap_or_else(|e| e.into_inner());
                    warn!(dependency = %spec.name, %state, "interrupted");
                    Err(ResolveError::Interrupted {
                        name: spec.name.clone(),
                        state: state.to_string(),
                    })
                }
            };

            match outcome {
                Ok(resolution) => resolutions.push(resolution),
                Err(e) => {
                    self.observer
                        .on_event(&ResolveEvent::Failed { spec, error: &e });
                    error = Some(e);
                    break;
                }
            }
        }

        ResolveReport {
            started_at,
            finished_at: Utc::now(),
            resolutions,
            error,
        }
    }

    async fn run_pipeline(
        &self,
        spec: &DependencySpec,
        state: &Mutex<ResolveState>,
    ) -> Result<Resolution, ResolveError> {
        let _guard = self.workspace.lock(spec.dir_name()).await;
        let prefix = self.workspace.install_prefix(spec);

        enter(state, ResolveState::Probing);
        info!(dependency = %spec, "probing");
        self.observer.on_event(&ResolveEvent::Checking(spec));
        let reason = match self.probe.probe(spec, &self.workspace).await {
            ProbeResult::Satisfied(version) => {
                info!(dependency = %spec.name, version = ?version, "satisfied");
                self.observer.on_event(&ResolveEvent::Found {
                    spec,
                    version: version.as_ref(),
                });
                return Ok(Resolution::new(
                    &spec.name,
                    version,
                    prefix,
                    ResolutionAction::Found,
                ));
            }
            ProbeResult::Unsatisfied(reason) => reason,
        };
        info!(dependency = %spec.name, %reason, "unsatisfied");
        self.observer.on_event(&ResolveEvent::NotFound {
            spec,
            reason: &reason,
        });

        if self.options.check_only {
            return Ok(Resolution::new(
                &spec.name,
                None,
                prefix,
                ResolutionAction::Missing { reason },
            ));
        }

        enter(state, ResolveState::Fetching);
        self.observer.on_event(&ResolveEvent::Fetching(spec));
        self.acquirer.acquire(spec, &self.workspace).await?;

        self.observer.on_event(&ResolveEvent::Building {
            spec,
            prefix: &prefix,
        });
        let recipe = create_recipe(&spec.build);
        let ctx = BuildContext::new(spec, &self.workspace, self.options.jobs);
        let on_stage = |stage: Stage| {
            enter(state, ResolveState::Building(stage));
            self.observer.on_event(&ResolveEvent::Stage { spec, stage });
        };
        if let BuildOutcome::Failed {
            stage,
            cause,
            diagnostic,
        } = self.executor.execute(recipe.as_ref(), &ctx, &on_stage).await
        {
            return Err(ResolveError::stage_failed(
                stage, &spec.name, cause, diagnostic,
            ));
        }

        enter(state, ResolveState::Reprobing);
        info!(dependency = %spec.name, "reprobing installed artifact");
        match self.probe.probe(spec, &self.workspace).await {
            ProbeResult::Satisfied(version) => {
                self.observer.on_event(&ResolveEvent::Built {
                    spec,
                    version: version.as_ref(),
                });
                Ok(Resolution::new(
                    &spec.name,
                    version,
                    prefix,
                    ResolutionAction::Built,
                ))
            }
            ProbeResult::Unsatisfied(reason) => Err(ResolveError::Reprobe {
                name: spec.name.clone(),
                prefix,
                reason,
            }),
        }
    }
}

fn enter(state: &Mutex<ResolveState>, next: ResolveState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendSpec, CommandProbe, ProbeDef, SourceOrigin};
    use crate::error::{HttpError, ProcessError};
    use crate::process::mock::ScriptedRunner;
    use crate::process::{CommandSpec, ProcessOutput};
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch_to(&self, url: &str, _dest: &Path) -> Result<u64, HttpError> {
            Err(HttpError::Network {
                url: url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    /// Every command except the probe tool hangs forever
    struct HangingRunner;

    #[async_trait]
    impl ProcessRunner for HangingRunner {
        async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
            if command.program == "demo-tool" {
                return Ok(ProcessOutput::failure(127, "not installed"));
            }
            std::future::pending().await
        }
    }

    fn tool_spec(name: &str) -> DependencySpec {
        DependencySpec::new(
            name,
            ProbeDef::Command(CommandProbe::new("demo-tool")),
            SourceOrigin::Git {
                url: "https://example.invalid/demo.git".to_string(),
                tag: "v1.0.0".to_string(),
            },
            BackendSpec::Cmake {
                options: Vec::new(),
                source_subdir: None,
            },
        )
    }

    fn resolver(root: &Path, runner: Arc<dyn ProcessRunner>) -> Resolver {
        Resolver::new(Workspace::new(root).unwrap(), runner, Arc::new(NoFetch))
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ResolveState::Probing.to_string(), "probing");
        assert_eq!(
            ResolveState::Building(Stage::Compile).to_string(),
            "building (compile)"
        );
    }

    #[test]
    fn test_default_jobs_is_host_cores() {
        assert_eq!(ResolverOptions::default().jobs, num_cpus::get());
    }

    #[tokio::test]
    async fn test_check_only_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| {
            Ok(ProcessOutput::failure(127, "demo-tool: not found"))
        }));
        let resolver = resolver(dir.path(), runner.clone()).with_options(ResolverOptions {
            check_only: true,
            ..Default::default()
        });

        let report = resolver.resolve_all(&[tool_spec("demo")]).await;
        assert!(report.error.is_none());
        assert!(!report.is_success());
        assert_eq!(report.missing().count(), 1);
        assert_eq!(runner.programs(), vec!["demo-tool"]);
        assert!(!dir.path().join("demo").exists());
    }

    #[tokio::test]
    async fn test_skip_optional() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let resolver = resolver(dir.path(), runner.clone()).with_options(ResolverOptions {
            skip_optional: true,
            ..Default::default()
        });

        let report = resolver
            .resolve_all(&[tool_spec("googletest").optional()])
            .await;
        assert!(report.is_success());
        assert_eq!(report.resolutions[0].action, ResolutionAction::Skipped);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|cmd| {
            if cmd.program == "git" {
                Ok(ProcessOutput::failure(128, "fatal: repository not found"))
            } else {
                Ok(ProcessOutput::failure(1, "missing"))
            }
        }));
        let resolver = resolver(dir.path(), runner.clone());

        let report = resolver
            .resolve_all(&[tool_spec("first"), tool_spec("second")])
            .await;
        let error = report.error.as_ref().unwrap();
        assert_eq!(error.dependency(), "first");
        assert_eq!(error.stage(), Some(Stage::Fetch));
        assert!(report.resolutions.is_empty());
        // "second" was never probed
        assert_eq!(runner.programs(), vec!["demo-tool", "git"]);
    }

    #[tokio::test]
    async fn test_interrupt_reports_current_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("demo")).unwrap();
        let resolver = resolver(dir.path(), Arc::new(HangingRunner));

        let report = resolver
            .resolve_all_until(
                &[tool_spec("demo")],
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;

        assert!(report.was_interrupted());
        match report.error {
            Some(ResolveError::Interrupted { name, state }) => {
                assert_eq!(name, "demo");
                assert_eq!(state, "building (configure)");
            }
            other => panic!("expected interruption, got {:?}", other),
        }
    }
}
