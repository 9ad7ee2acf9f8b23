use super::{BuildContext, BuildRecipe, InstallStep};
use crate::process::CommandSpec;
use std::io;
use std::path::PathBuf;

/// Options every CMake build gets: static, position-independent, release
const BASE_OPTIONS: &[&str] = &[
    "-DCMAKE_BUILD_TYPE=Release",
    "-DCMAKE_POSITION_INDEPENDENT_CODE=ON",
    "-DBUILD_SHARED_LIBS=OFF",
];

/// Out-of-tree CMake build in `<source>/build`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmakeRecipe {
    options: Vec<String>,
    source_subdir: Option<PathBuf>,
}

impl CmakeRecipe {
    pub fn new(options: Vec<String>, source_subdir: Option<PathBuf>) -> Self {
        Self {
            options,
            source_subdir,
        }
    }
}

impl BuildRecipe for CmakeRecipe {
    fn backend(&self) -> &'static str {
        "cmake"
    }

    /// The build directory is reused across retries
    fn prepare(&self, ctx: &BuildContext) -> io::Result<()> {
        std::fs::create_dir_all(&ctx.build_dir)
    }

    fn configure(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        let source = match &self.source_subdir {
            Some(subdir) => ctx.source_dir.join(subdir),
            None => ctx.source_dir.clone(),
        };
        let command = CommandSpec::new("cmake")
            .args(BASE_OPTIONS.iter().copied())
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", ctx.prefix.display()))
            .args(self.options.iter().cloned())
            .arg_path(source)
            .current_dir(&ctx.build_dir);
        vec![command]
    }

    fn compile(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        vec![CommandSpec::new("cmake")
            .args(["--build", ".", "--parallel"])
            .arg(ctx.jobs.to_string())
            .current_dir(&ctx.build_dir)]
    }

    fn install(&self, ctx: &BuildContext) -> Vec<InstallStep> {
        vec![InstallStep::Run(
            CommandSpec::new("cmake")
                .args(["--install", "."])
                .current_dir(&ctx.build_dir),
        )]
    }
}
