//! Source acquisition
//!
//! Obtains a dependency's source tree or artifact into `ext/<dir>/`:
//! - git clone at a pinned tag or branch
//! - streamed download of a single (optionally executable) file
//! - SDK component manager install (license acceptance + package)
//!
//! An existing `ext/<dir>/` directory means "already acquired" and nothing is
//! fetched; the engine never pulls or moves an existing checkout to another
//! revision. Downloads and SDK installs are staged in a temporary directory
//! and moved into place only once complete, so an interrupted fetch never
//! leaves the marker behind.

mod download;
mod git;
mod sdk;

use crate::domain::{DependencySpec, SourceOrigin};
use crate::error::ResolveError;
use crate::http::Fetcher;
use crate::process::ProcessRunner;
use crate::workspace::Workspace;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Result of an acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    /// `ext/<dir>/`
    pub path: PathBuf,
    /// False when the directory already existed and nothing was fetched
    pub fetched: bool,
}

/// Fetches sources into the workspace
#[derive(Clone)]
pub struct SourceAcquirer {
    runner: Arc<dyn ProcessRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl SourceAcquirer {
    /// Create a new acquirer
    pub fn new(runner: Arc<dyn ProcessRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { runner, fetcher }
    }

    /// Make sure `ext/<dir>/` holds the dependency's source or artifact
    pub async fn acquire(
        &self,
        spec: &DependencySpec,
        workspace: &Workspace,
    ) -> Result<Acquired, ResolveError> {
        let dest = workspace.source_dir(spec);

        match std::fs::metadata(&dest) {
            Ok(meta) if meta.is_dir() => {
                info!(
                    dependency = %spec.name,
                    path = %dest.display(),
                    "source already present, skipping fetch"
                );
                return Ok(Acquired {
                    path: dest,
                    fetched: false,
                });
            }
            Ok(_) => {
                return Err(ResolveError::inconsistency(
                    &spec.name,
                    &dest,
                    "exists but is not a directory; remove it and re-run",
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ResolveError::fetch(
                    &spec.name,
                    format!("cannot inspect {}", dest.display()),
                    e.to_string(),
                ))
            }
        }

        workspace.ensure_root().map_err(|e| {
            ResolveError::fetch(
                &spec.name,
                format!("cannot create workspace {}", workspace.root().display()),
                e.to_string(),
            )
        })?;

        info!(dependency = %spec.name, origin = %spec.source.describe(), "fetching source");
        match &spec.source {
            SourceOrigin::Git { url, tag } => {
                git::clone(self.runner.as_ref(), &spec.name, url, tag, workspace.root(), &dest)
                    .await?
            }
            SourceOrigin::Download {
                url,
                file,
                executable,
            } => {
                download::download(
                    self.fetcher.as_ref(),
                    &spec.name,
                    url,
                    file,
                    *executable,
                    workspace.root(),
                    &dest,
                )
                .await?
            }
            SourceOrigin::Sdk {
                manager,
                package,
                accept_licenses,
            } => {
                sdk::install(
                    self.runner.as_ref(),
                    &spec.name,
                    manager,
                    package,
                    *accept_licenses,
                    workspace.root(),
                    &dest,
                )
                .await?
            }
        }

        Ok(Acquired {
            path: dest,
            fetched: true,
        })
    }
}

/// Create a staging directory next to the destination
fn staging_dir(name: &str, root: &Path) -> Result<tempfile::TempDir, ResolveError> {
    tempfile::Builder::new()
        .prefix(&format!(".{}-staging-", name))
        .tempdir_in(root)
        .map_err(|e| ResolveError::fetch(name, "cannot create staging directory", e.to_string()))
}

/// Move a completed staging directory to its final place
///
/// The destination was absent when acquisition started; finding it now means
/// another run created it concurrently.
fn promote(name: &str, staging: tempfile::TempDir, dest: &Path) -> Result<(), ResolveError> {
    if dest.exists() {
        return Err(ResolveError::inconsistency(
            name,
            dest,
            "appeared while fetching; another run may be using this workspace",
        ));
    }
    std::fs::rename(staging.path(), dest).map_err(|e| {
        ResolveError::fetch(
            name,
            format!("cannot move staged files to {}", dest.display()),
            e.to_string(),
        )
    })
    // Dropping `staging` now only finds an already-moved path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendSpec, CommandProbe, ProbeDef};
    use crate::error::HttpError;
    use crate::process::mock::ScriptedRunner;
    use crate::process::ProcessOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(super) struct FakeFetcher {
        pub body: &'static [u8],
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeFetcher {
        pub fn new(body: &'static [u8]) -> Self {
            Self {
                body,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HttpError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            std::fs::write(dest, self.body).map_err(|source| HttpError::Write {
                path: dest.to_path_buf(),
                source,
            })?;
            Ok(self.body.len() as u64)
        }
    }

    fn git_spec() -> DependencySpec {
        DependencySpec::new(
            "fmt",
            ProbeDef::Command(CommandProbe::new("true")),
            SourceOrigin::Git {
                url: "https://github.com/fmtlib/fmt".to_string(),
                tag: "11.0.2".to_string(),
            },
            BackendSpec::Cmake {
                options: Vec::new(),
                source_subdir: None,
            },
        )
    }

    /// Runner whose `git clone` creates the destination directory
    fn cloning_runner() -> Arc<ScriptedRunner> {
        Arc::new(ScriptedRunner::new(|cmd| {
            if cmd.program == "git" {
                let dest = cmd.args.last().unwrap();
                std::fs::create_dir_all(dest).unwrap();
            }
            Ok(ProcessOutput::success(""))
        }))
    }

    #[tokio::test]
    async fn test_acquire_twice_is_noop_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("ext")).unwrap();
        let runner = cloning_runner();
        let acquirer = SourceAcquirer::new(runner.clone(), Arc::new(FakeFetcher::new(b"")));

        let first = acquirer.acquire(&git_spec(), &ws).await.unwrap();
        assert!(first.fetched);
        assert_eq!(first.path, dir.path().join("ext/fmt"));
        assert_eq!(runner.calls().len(), 1);

        let second = acquirer.acquire(&git_spec(), &ws).await.unwrap();
        assert!(!second.fetched);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_directory_skips_clone() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("fmt")).unwrap();
        let runner = cloning_runner();
        let acquirer = SourceAcquirer::new(runner.clone(), Arc::new(FakeFetcher::new(b"")));

        let acquired = acquirer.acquire(&git_spec(), &ws).await.unwrap();
        assert!(!acquired.fetched);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_file_in_place_of_directory_is_inconsistency() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("fmt"), b"oops").unwrap();
        let runner = cloning_runner();
        let acquirer = SourceAcquirer::new(runner.clone(), Arc::new(FakeFetcher::new(b"")));

        let err = acquirer.acquire(&git_spec(), &ws).await.unwrap_err();
        assert!(matches!(err, ResolveError::WorkspaceInconsistency { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_workspace_root_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("nested/ext")).unwrap();
        let acquirer = SourceAcquirer::new(cloning_runner(), Arc::new(FakeFetcher::new(b"")));

        acquirer.acquire(&git_spec(), &ws).await.unwrap();
        assert!(dir.path().join("nested/ext/fmt").is_dir());
    }
}
