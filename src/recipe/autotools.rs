use super::{BuildContext, BuildRecipe, InstallStep};
use crate::process::CommandSpec;

/// Compiler flags overlaid on every autotools command
const PIC_FLAGS: &str = "-fPIC";

/// In-tree autogen + configure + make build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutotoolsRecipe {
    autogen: String,
    configure_flags: Vec<String>,
}

impl AutotoolsRecipe {
    pub fn new(autogen: String, configure_flags: Vec<String>) -> Self {
        Self {
            autogen,
            configure_flags,
        }
    }

    fn command(&self, program: impl Into<String>, ctx: &BuildContext) -> CommandSpec {
        CommandSpec::new(program)
            .current_dir(&ctx.source_dir)
            .env("CFLAGS", PIC_FLAGS)
            .env("CXXFLAGS", PIC_FLAGS)
    }
}

impl BuildRecipe for AutotoolsRecipe {
    fn backend(&self) -> &'static str {
        "autotools"
    }

    fn configure(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        let mut commands = Vec::new();
        if !self.autogen.is_empty() {
            let autogen = ctx.source_dir.join(&self.autogen).display().to_string();
            commands.push(self.command(autogen, ctx));
        }
        commands.push(
            self.command(ctx.source_dir.join("configure").display().to_string(), ctx)
                .args(["--disable-shared", "--enable-static"])
                .arg(format!("--prefix={}", ctx.prefix.display()))
                .args(self.configure_flags.iter().cloned()),
        );
        commands
    }

    fn compile(&self, ctx: &BuildContext) -> Vec<CommandSpec> {
        vec![self.command("make", ctx).arg(format!("-j{}", ctx.jobs))]
    }

    fn install(&self, ctx: &BuildContext) -> Vec<InstallStep> {
        vec![InstallStep::Run(self.command("make", ctx).arg("install"))]
    }
}
