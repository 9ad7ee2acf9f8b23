//! Dependency manifest (`extboot.toml`)
//!
//! This module provides:
//! - Loading and parsing the locally declared dependency list
//! - Validation of entries (unique names and directories, backend/source fit)
//! - `--only` / `--exclude` selection preserving declaration order

use crate::domain::{BackendSpec, DependencySpec, SourceOrigin};
use crate::error::ManifestError;
use crate::prereq::Prerequisites;
use crate::workspace::DEFAULT_ROOT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Default manifest file name inside the project directory
pub const DEFAULT_MANIFEST: &str = "extboot.toml";

/// `[workspace]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root, relative to the project directory
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub prerequisites: Prerequisites,
    /// `[[dependency]]` entries in declaration order
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencySpec>,
}

impl Manifest {
    /// Read and validate a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::not_found(path)
            } else {
                ManifestError::read_error(path, e)
            }
        })?;
        Self::parse(&content, path)
    }

    /// Parse and validate manifest content; `path` is used in errors only
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content)
            .map_err(|e| ManifestError::toml_parse_error(path, e.to_string()))?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Workspace root for a project directory
    pub fn workspace_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.workspace.root)
    }

    /// Dependencies filtered by `only` (when non-empty) and `exclude`
    pub fn select(&self, only: &[String], exclude: &[String]) -> Vec<DependencySpec> {
        self.dependencies
            .iter()
            .filter(|d| only.is_empty() || only.contains(&d.name))
            .filter(|d| !exclude.contains(&d.name))
            .cloned()
            .collect()
    }

    /// Names in `names` that no dependency declares
    pub fn unknown_names<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| !self.dependencies.iter().any(|d| &d.name == *n))
            .map(String::as_str)
            .collect()
    }

    fn validate(&self, path: &Path) -> Result<(), ManifestError> {
        let mut names = HashSet::new();
        let mut dirs = HashSet::new();

        for dep in &self.dependencies {
            let invalid = |message: &str| ManifestError::invalid_entry(path, &dep.name, message);

            if dep.name.trim().is_empty() {
                return Err(invalid("name must not be empty"));
            }
            if !names.insert(dep.name.as_str()) {
                return Err(invalid("declared more than once"));
            }
            if !is_plain_name(dep.dir_name()) {
                return Err(invalid("dir must be a single directory name"));
            }
            // Each entry owns `<dir>` and `<dir>-bin` under the workspace root
            let source_dir = dep.dir_name().to_string();
            let prefix_dir = format!("{}-bin", source_dir);
            if dirs.contains(&source_dir) || dirs.contains(&prefix_dir) {
                return Err(invalid("shares its workspace directory with another dependency"));
            }
            dirs.insert(source_dir);
            dirs.insert(prefix_dir);

            match (&dep.source, &dep.build) {
                (SourceOrigin::Download { file, .. }, BackendSpec::Prebuilt) => {
                    if !is_plain_name(file) {
                        return Err(invalid("download file must be a plain file name"));
                    }
                }
                (SourceOrigin::Sdk { .. }, BackendSpec::Prebuilt) => {}
                (SourceOrigin::Download { .. } | SourceOrigin::Sdk { .. }, _) => {
                    return Err(invalid(
                        "download and sdk sources can only use the prebuilt build kind",
                    ));
                }
                (SourceOrigin::Git { tag, .. }, _) if tag.trim().is_empty() => {
                    return Err(invalid("git source needs a tag or branch"));
                }
                _ => {}
            }

            if let BackendSpec::Manual {
                artifacts,
                include_dirs,
                ..
            } = &dep.build
            {
                if artifacts.is_empty() && include_dirs.is_empty() {
                    return Err(invalid(
                        "manual build needs at least one artifact or include directory",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One normal path component, no separators or `..`
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
