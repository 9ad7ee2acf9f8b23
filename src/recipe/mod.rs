//! Build recipes
//!
//! A recipe turns a fetched source tree into an installed prefix by driving
//! an external toolchain through three stages: configure, compile, install.
//! Backends only describe the commands for each stage; `RecipeExecutor`
//! runs them, applies the dependency's environment overlay and stops at the
//! first failure, reporting which stage it was.

mod autotools;
mod cmake;
mod manual;

pub use autotools::AutotoolsRecipe;
pub use cmake::CmakeRecipe;
pub use manual::ManualRecipe;

use crate::domain::{BackendSpec, BuildOutcome, DependencySpec, Stage};
use crate::process::{CommandSpec, ProcessRunner};
use crate::workspace::Workspace;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Everything a recipe needs to know about one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Dependency name, for diagnostics
    pub name: String,
    /// `ext/<dir>/`
    pub source_dir: PathBuf,
    /// `ext/<dir>/build/`
    pub build_dir: PathBuf,
    /// `ext/<dir>-bin/`, always absolute
    pub prefix: PathBuf,
    /// Parallel job count passed to the build tool
    pub jobs: usize,
    /// Dependency-specific variables, applied last over every command
    pub env: BTreeMap<String, String>,
}

impl BuildContext {
    /// Build context for `spec` inside `workspace`
    pub fn new(spec: &DependencySpec, workspace: &Workspace, jobs: usize) -> Self {
        Self {
            name: spec.name.clone(),
            source_dir: workspace.source_dir(spec),
            build_dir: workspace.build_dir(spec),
            prefix: workspace.install_prefix(spec),
            jobs: jobs.max(1),
            env: spec.env.clone(),
        }
    }

    /// `<prefix>/lib`
    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    /// `<prefix>/include`
    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join("include")
    }
}

/// One action of the install stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    /// Run the build tool's install target
    Run(CommandSpec),
    /// Copy a single file into a directory
    CopyFile { from: PathBuf, to_dir: PathBuf },
    /// Copy a directory tree into a directory, keeping its name
    CopyTree { from: PathBuf, to_dir: PathBuf },
}

/// Trait implemented by every build backend
pub trait BuildRecipe: Send + Sync {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Filesystem setup before configure (e.g. creating the build directory)
    fn prepare(&self, _ctx: &BuildContext) -> io::Result<()> {
        Ok(())
    }

    /// Commands of the configure stage
    fn configure(&self, ctx: &BuildContext) -> Vec<CommandSpec>;

    /// Commands of the compile stage
    fn compile(&self, ctx: &BuildContext) -> Vec<CommandSpec>;

    /// Actions of the install stage
    fn install(&self, ctx: &BuildContext) -> Vec<InstallStep>;
}

/// Recipe for artifacts that are usable as fetched
#[derive(Debug, Default)]
pub struct PrebuiltRecipe;

impl BuildRecipe for PrebuiltRecipe {
    fn backend(&self) -> &'static str {
        "prebuilt"
    }

    fn configure(&self, _ctx: &BuildContext) -> Vec<CommandSpec> {
        Vec::new()
    }

    fn compile(&self, _ctx: &BuildContext) -> Vec<CommandSpec> {
        Vec::new()
    }

    fn install(&self, _ctx: &BuildContext) -> Vec<InstallStep> {
        Vec::new()
    }
}

/// Create the recipe for a backend declaration
pub fn create_recipe(backend: &BackendSpec) -> Box<dyn BuildRecipe> {
    match backend {
        BackendSpec::Cmake {
            options,
            source_subdir,
        } => Box::new(CmakeRecipe::new(options.clone(), source_subdir.clone())),
        BackendSpec::Autotools {
            autogen,
            configure_flags,
        } => Box::new(AutotoolsRecipe::new(autogen.clone(), configure_flags.clone())),
        BackendSpec::Manual {
            configure,
            build,
            artifacts,
            include_dirs,
        } => Box::new(ManualRecipe::new(
            configure.clone(),
            build.clone(),
            artifacts.clone(),
            include_dirs.clone(),
        )),
        BackendSpec::Prebuilt => Box::new(PrebuiltRecipe),
    }
}

/// Runs a recipe's stages through a `ProcessRunner`
#[derive(Clone)]
pub struct RecipeExecutor {
    runner: Arc<dyn ProcessRunner>,
}

impl RecipeExecutor {
    /// Create a new executor
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Run configure, compile and install in order
    ///
    /// `on_stage` is called as each stage starts. The first failing command
    /// aborts the build; later stages never run.
    pub async fn execute(
        &self,
        recipe: &dyn BuildRecipe,
        ctx: &BuildContext,
        on_stage: &(dyn Fn(Stage) + Send + Sync),
    ) -> BuildOutcome {
        info!(
            dependency = %ctx.name,
            backend = recipe.backend(),
            prefix = %ctx.prefix.display(),
            "building"
        );

        on_stage(Stage::Configure);
        if let Err(e) = recipe.prepare(ctx) {
            return BuildOutcome::failed(
                Stage::Configure,
                format!("cannot prepare {}", ctx.build_dir.display()),
                e.to_string(),
            );
        }
        if let Some(failure) = self
            .run_all(Stage::Configure, recipe.configure(ctx), ctx)
            .await
        {
            return failure;
        }

        on_stage(Stage::Compile);
        if let Some(failure) = self.run_all(Stage::Compile, recipe.compile(ctx), ctx).await {
            return failure;
        }

        on_stage(Stage::Install);
        for step in recipe.install(ctx) {
            let failure = match step {
                InstallStep::Run(command) => self.run_one(Stage::Install, command, ctx).await,
                InstallStep::CopyFile { from, to_dir } => copy_file_into(&from, &to_dir)
                    .err()
                    .map(|e| copy_failure(&from, &to_dir, e)),
                InstallStep::CopyTree { from, to_dir } => copy_tree_into(&from, &to_dir)
                    .err()
                    .map(|e| copy_failure(&from, &to_dir, e)),
            };
            if let Some(failure) = failure {
                return failure;
            }
        }

        BuildOutcome::Installed(ctx.prefix.clone())
    }

    async fn run_all(
        &self,
        stage: Stage,
        commands: Vec<CommandSpec>,
        ctx: &BuildContext,
    ) -> Option<BuildOutcome> {
        for command in commands {
            if let Some(failure) = self.run_one(stage, command, ctx).await {
                return Some(failure);
            }
        }
        None
    }

    async fn run_one(
        &self,
        stage: Stage,
        command: CommandSpec,
        ctx: &BuildContext,
    ) -> Option<BuildOutcome> {
        let command = command.overlay(&ctx.env);
        debug!(dependency = %ctx.name, %stage, command = %command, "stage command");

        match self.runner.run(&command).await {
            Ok(output) if output.success => None,
            Ok(output) => Some(BuildOutcome::failed(
                stage,
                format!("`{}` exited with {}", command, output.describe_status()),
                output.combined(),
            )),
            Err(e) => Some(BuildOutcome::failed(
                stage,
                format!("cannot run `{}`", command),
                e.to_string(),
            )),
        }
    }
}

fn copy_failure(from: &Path, to_dir: &Path, error: io::Error) -> BuildOutcome {
    BuildOutcome::failed(
        Stage::Install,
        format!("cannot copy {} into {}", from.display(), to_dir.display()),
        error.to_string(),
    )
}

/// Copy `from` into `to_dir`, creating the directory first
fn copy_file_into(from: &Path, to_dir: &Path) -> io::Result<()> {
    let file_name = from.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name")
    })?;
    std::fs::create_dir_all(to_dir)?;
    std::fs::copy(from, to_dir.join(file_name))?;
    Ok(())
}

/// Copy the tree rooted at `from` to `to_dir/<name of from>`
fn copy_tree_into(from: &Path, to_dir: &Path) -> io::Result<()> {
    let dir_name = from.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "source path has no directory name")
    })?;
    if !from.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", from.display()),
        ));
    }
    copy_dir_recursive(from, &to_dir.join(dir_name))
}

/// Copy a tree, recreating symlinks instead of following them
fn copy_dir_recursive(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(to).is_ok() {
        std::fs::remove_file(to)?;
    }
    let link = std::fs::read_link(from)?;
    std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    if std::fs::metadata(from)?.is_dir() {
        copy_dir_recursive(from, to)
    } else {
        std::fs::copy(from, to).map(|_| ())
    }
}

/// Resolve a relative program such as `./configure` against `dir`
fn program_in(dir: &Path, program: &str) -> String {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        dir.join(path).display().to_string()
    } else {
        program.to_string()
    }
}
