use super::{promote, staging_dir};
use crate::error::ResolveError;
use crate::process::{CommandSpec, ProcessRunner};
use std::path::Path;
use tracing::debug;

/// Answers fed to the license prompt; the manager stops reading once done
const LICENSE_ANSWERS: usize = 32;

/// Install an SDK component with its manager, rooted at `dest`
pub(super) async fn install(
    runner: &dyn ProcessRunner,
    name: &str,
    manager: &str,
    package: &str,
    accept_licenses: bool,
    root: &Path,
    dest: &Path,
) -> Result<(), ResolveError> {
    let staging = staging_dir(name, root)?;
    let sdk_root = format!("--sdk_root={}", staging.path().display());

    if accept_licenses {
        let licenses = CommandSpec::new(manager)
            .arg(sdk_root.clone())
            .arg("--licenses")
            .stdin("y\n".repeat(LICENSE_ANSWERS))
            .current_dir(root);
        run_checked(runner, name, &licenses).await?;
    }

    let component = CommandSpec::new(manager)
        .arg(sdk_root)
        .arg(package)
        .current_dir(root);
    run_checked(runner, name, &component).await?;
    debug!(dependency = name, package, "sdk component installed");

    promote(name, staging, dest)
}

async fn run_checked(
    runner: &dyn ProcessRunner,
    name: &str,
    command: &CommandSpec,
) -> Result<(), ResolveError> {
    let output = runner.run(command).await.map_err(|e| {
        ResolveError::fetch(name, format!("cannot run `{}`", command), e.to_string())
    })?;
    if output.success {
        Ok(())
    } else {
        Err(ResolveError::fetch(
            name,
            format!("`{}` exited with {}", command, output.describe_status()),
            output.combined(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::process::mock::ScriptedRunner;
    use crate::process::ProcessOutput;

    /// Writes a file into the `--sdk_root` the way sdkmanager would
    fn installing_runner() -> ScriptedRunner {
        ScriptedRunner::new(|cmd| {
            if !cmd.args.iter().any(|a| a == "--licenses") {
                let sdk_root = cmd.args[0].trim_start_matches("--sdk_root=");
                let dir = Path::new(sdk_root).join("ndk/26.1.10909125");
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("source.properties"), b"Pkg.Revision = 26.1.10909125")
                    .unwrap();
            }
            Ok(ProcessOutput::success(""))
        })
    }

    #[tokio::test]
    async fn test_licenses_then_package() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("android-ndk");
        let runner = installing_runner();

        install(
            &runner,
            "ndk",
            "sdkmanager",
            "ndk;26.1.10909125",
            true,
            root.path(),
            &dest,
        )
        .await
        .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[1], "--licenses");
        assert!(calls[0].stdin.as_deref().unwrap().starts_with("y\ny\n"));
        assert_eq!(calls[1].args[1], "ndk;26.1.10909125");
        assert!(calls[1].stdin.is_none());
        assert!(dest.join("ndk/26.1.10909125/source.properties").is_file());
    }

    #[tokio::test]
    async fn test_skip_license_step() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("cmdline");
        let runner = installing_runner();

        install(&runner, "tools", "sdkmanager", "platform-tools", false, root.path(), &dest)
            .await
            .unwrap();
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_manager_failure_leaves_no_marker() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("android-ndk");
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.args.iter().any(|a| a == "--licenses") {
                Ok(ProcessOutput::success(""))
            } else {
                Ok(ProcessOutput::failure(1, "Failed to find package"))
            }
        });

        let err = install(&runner, "ndk", "sdkmanager", "ndk;0", true, root.path(), &dest)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert!(err.diagnostic().contains("Failed to find package"));
        assert!(!dest.exists());
    }
}
