use super::{program_in, BuildContext, BuildRecipe, InstallStep};
use crate::process::CommandSpec;
use std::path::PathBuf;

/// Configure and build in-tree, then copy outputs into the prefix by hand
///
/// Used for projects whose build system has no usable install target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualRecipe {
    configure: Vec<String>,
    build: Option<Vec<String>>,
    artifacts: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
}

impl ManualRecipe {
    pub fn new(
        configure: Vec<String>,
        build: Option<Vec<String>>,
        artifacts: Vec<PathBuf>,
        include_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            configure,
            build,
            artifacts,
            include_dirs,
        }
    }

    /// An empty argv means the step is skipped
    fn argv_command(argv: &[String], ctx: &BuildContext) -> Option<CommandSpec> {
        let mut command = CommandSpec::from_argv(argv).ok()?;
        command.program = program_in(&ctx.source_dir, &command.program);
        Some(command.current_dir(&ctx.source_dir))
    }
}

impl BuildRecipe for ManualRecipe {
    fn backend(&self) -> &'static str {
        "manual"
    }

    fn configure(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        Self::argv_command(&self.configure, ctx).into_iter().collect()
    }

    fn compile(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        match &self.build {
            Some(argv) => Self::argv_command(argv, ctx).into_iter().collect(),
            None => vec![CommandSpec::new("make")
                .arg(format!("-j{}", ctx.jobs))
                .current_dir(&ctx.source_dir)],
        }
    }

    fn install(&self, ctx: &BuildContext) -> Vec<InstallStep> {
        let artifacts = self.artifacts.iter().map(|file| InstallStep::CopyFile {
            from: ctx.source_dir.join(file),
            to_dir: ctx.lib_dir(),
        });
        let includes = self.include_dirs.iter().map(|dir| InstallStep::CopyTree {
            from: ctx.source_dir.join(dir),
            to_dir: ctx.include_dir(),
        });
        artifacts.chain(includes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildOutcome, Stage};
    use crate::process::mock::ScriptedRunner;
    use crate::recipe::tests::context;
    use crate::recipe::RecipeExecutor;
    use std::path::Path;
    use std::sync::Arc;

    fn recipe() -> ManualRecipe {
        ManualRecipe::new(
            vec!["./configure".to_string(), "--static".to_string()],
            None,
            vec![PathBuf::from("libdemo.a")],
            vec![PathBuf::from("include/demo")],
        )
    }

    #[test]
    fn test_commands() {
        let ctx = context(Path::new("/ws"));
        let recipe = recipe();

        let configure = recipe.configure(&ctx);
        assert_eq!(configure.len(), 1);
        assert_eq!(configure[0].program, "/ws/demo/./configure");
        assert_eq!(configure[0].args, vec!["--static"]);

        let compile = recipe.compile(&ctx);
        assert_eq!(compile[0].program, "make");
        assert_eq!(compile[0].args, vec!["-j8"]);
    }

    #[test]
    fn test_empty_configure_and_custom_build() {
        let ctx = context(Path::new("/ws"));
        let recipe = ManualRecipe::new(
            Vec::new(),
            Some(vec!["ninja".to_string(), "demo".to_string()]),
            Vec::new(),
            Vec::new(),
        );

        assert!(recipe.configure(&ctx).is_empty());
        let compile = recipe.compile(&ctx);
        assert_eq!(compile[0].program, "ninja");
        assert_eq!(compile[0].args, vec!["demo"]);
    }

    #[test]
    fn test_relative_build_script_runs_in_checkout() {
        let ctx = context(Path::new("/ws"));
        let recipe = ManualRecipe::new(
            Vec::new(),
            Some(vec!["scripts/build.sh".to_string(), "--release".to_string()]),
            Vec::new(),
            Vec::new(),
        );

        let compile = recipe.compile(&ctx);
        assert_eq!(compile.len(), 1);
        assert_eq!(compile[0].program, "/ws/demo/scripts/build.sh");
        assert_eq!(compile[0].args, vec!["--release"]);
        assert_eq!(compile[0].cwd.as_deref(), Some(Path::new("/ws/demo")));

        let skipped = ManualRecipe::new(Vec::new(), Some(Vec::new()), Vec::new(), Vec::new());
        assert!(skipped.compile(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_copies_into_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        std::fs::create_dir_all(ctx.source_dir.join("include/demo")).unwrap();
        std::fs::write(ctx.source_dir.join("include/demo/demo.h"), b"").unwrap();
        std::fs::write(ctx.source_dir.join("libdemo.a"), b"!<arch>\n").unwrap();

        let executor = RecipeExecutor::new(Arc::new(ScriptedRunner::succeeding()));
        let outcome = executor.execute(&recipe(), &ctx, &|_: Stage| {}).await;

        assert_eq!(outcome, BuildOutcome::Installed(ctx.prefix.clone()));
        assert!(ctx.prefix.join("lib/libdemo.a").is_file());
        assert!(ctx.prefix.join("include/demo/demo.h").is_file());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_install_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        std::fs::create_dir_all(&ctx.source_dir).unwrap();

        let executor = RecipeExecutor::new(Arc::new(ScriptedRunner::succeeding()));
        let outcome = executor.execute(&recipe(), &ctx, &|_: Stage| {}).await;

        match outcome {
            BuildOutcome::Failed { stage, cause, .. } => {
                assert_eq!(stage, Stage::Install);
                assert!(cause.contains("libdemo.a"));
            }
            other => panic!("expected install failure, got {:?}", other),
        }
    }
}
