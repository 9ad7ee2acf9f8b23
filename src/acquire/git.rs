use crate::error::ResolveError;
use crate::process::{CommandSpec, ProcessRunner};
use std::path::Path;
use tracing::debug;

/// Clone `url` at `tag` into `dest`
///
/// A failed clone may leave a partial `dest` behind; it is reported rather
/// than removed, since the directory is also the "already fetched" marker.
pub(super) async fn clone(
    runner: &dyn ProcessRunner,
    name: &str,
    url: &str,
    tag: &str,
    root: &Path,
    dest: &Path,
) -> Result<(), ResolveError> {
    let command = CommandSpec::new("git")
        .args(["clone", "--branch", tag, url])
        .arg_path(dest)
        .current_dir(root);
    debug!(dependency = name, command = %command, "cloning");

    let output = runner.run(&command).await.map_err(|e| {
        ResolveError::fetch(name, format!("cannot run `{}`", command), e.to_string())
    })?;

    if !output.success {
        let diagnostic = output.combined();
        if diagnostic.contains("already exists") {
            return Err(ResolveError::inconsistency(
                name,
                dest,
                "destination already exists; another run may be using this workspace",
            ));
        }
        let mut message = format!("`{}` exited with {}", command, output.describe_status());
        if dest.exists() {
            message.push_str(&format!(
                "; remove {} before retrying",
                dest.display()
            ));
        }
        return Err(ResolveError::fetch(name, message, diagnostic));
    }

    if !dest.is_dir() {
        return Err(ResolveError::fetch(
            name,
            format!("`{}` succeeded but {} was not created", command, dest.display()),
            output.combined(),
        ));
    }
    Ok(())
}
