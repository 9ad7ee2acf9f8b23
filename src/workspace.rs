//! Filesystem workspace holding dependency checkouts and install prefixes
//!
//! Layout under the workspace root (default `ext/`):
//! - `<dir>/`       source checkout or downloaded artifact
//! - `<dir>/build/` out-of-tree build directory (CMake backend)
//! - `<dir>-bin/`   private install prefix with `include/` and `lib/`
//!
//! The existence of `<dir>/` is the only "already fetched" marker. The
//! workspace is created lazily and never cleaned up automatically.

use crate::domain::DependencySpec;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default workspace directory name, relative to the project
pub const DEFAULT_ROOT: &str = "ext";

/// Explicit workspace value passed to every component
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Workspace {
    /// Create a workspace rooted at `root`, made absolute against the current directory
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::path::absolute(root.as_ref())?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Absolute workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace root if it does not exist yet
    pub fn ensure_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// `ext/<dir>/`
    pub fn source_dir(&self, spec: &DependencySpec) -> PathBuf {
        self.root.join(spec.dir_name())
    }

    /// `ext/<dir>/build/`
    pub fn build_dir(&self, spec: &DependencySpec) -> PathBuf {
        self.source_dir(spec).join("build")
    }

    /// `ext/<dir>-bin/`
    pub fn install_prefix(&self, spec: &DependencySpec) -> PathBuf {
        self.root.join(format!("{}-bin", spec.dir_name()))
    }

    /// Acquire the named lock guarding one dependency's paths
    ///
    /// Dependencies never share a sub-path, so one lock per directory name is
    /// enough for concurrent pipelines.
    pub async fn lock(&self, dir_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(dir_name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// `lib/` and `lib64/` under a prefix, in search order, that exist on disk
pub fn library_dirs(prefix: &Path) -> Vec<PathBuf> {
    ["lib", "lib64"]
        .iter()
        .map(|d| prefix.join(d))
        .filter(|p| p.is_dir())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendSpec, CommandProbe, ProbeDef, SourceOrigin};
    use std::time::Duration;

    fn spec(name: &str) -> DependencySpec {
        DependencySpec::new(
            name,
            ProbeDef::Command(CommandProbe::new("true")),
            SourceOrigin::Git {
                url: "https://example.invalid/repo.git".to_string(),
                tag: "v1".to_string(),
            },
            BackendSpec::Prebuilt,
        )
    }

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("ext")).unwrap();
        let xxhash = spec("xxhash").with_dir("xxHash");

        assert_eq!(ws.source_dir(&xxhash), dir.path().join("ext/xxHash"));
        assert_eq!(ws.build_dir(&xxhash), dir.path().join("ext/xxHash/build"));
        assert_eq!(ws.install_prefix(&xxhash), dir.path().join("ext/xxHash-bin"));
    }

    #[test]
    fn test_relative_root_becomes_absolute() {
        let ws = Workspace::new("ext").unwrap();
        assert!(ws.root().is_absolute());
        assert!(ws.root().ends_with("ext"));
    }

    #[test]
    fn test_root_is_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("ext")).unwrap();
        assert!(!ws.root().exists());
        ws.ensure_root().unwrap();
        assert!(ws.root().is_dir());
    }

    #[test]
    fn test_library_dirs_only_existing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(library_dirs(dir.path()).is_empty());
        std::fs::create_dir_all(dir.path().join("lib64")).unwrap();
        assert_eq!(library_dirs(dir.path()), vec![dir.path().join("lib64")]);
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        assert_eq!(
            library_dirs(dir.path()),
            vec![dir.path().join("lib"), dir.path().join("lib64")]
        );
    }

    #[tokio::test]
    async fn test_lock_is_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();

        let _fmt = ws.lock("fmt").await;
        // A different name is not blocked
        let ffi = tokio::time::timeout(Duration::from_millis(200), ws.lock("libffi")).await;
        assert!(ffi.is_ok());
        // The same name is
        let again = tokio::time::timeout(Duration::from_millis(50), ws.lock("fmt")).await;
        assert!(again.is_err());
    }
}
