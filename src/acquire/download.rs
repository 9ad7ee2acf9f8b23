use super::{promote, staging_dir};
use crate::error::ResolveError;
use crate::http::Fetcher;
use std::path::Path;
use tracing::debug;

/// Download `url` as `<dest>/<file>`
///
/// The file lands in a staging directory first; `dest` appears only after the
/// whole body has been written.
pub(super) async fn download(
    fetcher: &dyn Fetcher,
    name: &str,
    url: &str,
    file: &str,
    executable: bool,
    root: &Path,
    dest: &Path,
) -> Result<(), ResolveError> {
    let staging = staging_dir(name, root)?;
    let target = staging.path().join(file);

    let bytes = fetcher
        .fetch_to(url, &target)
        .await
        .map_err(|e| ResolveError::fetch(name, format!("cannot download {}", url), e.to_string()))?;
    debug!(dependency = name, url, bytes, "downloaded");

    if executable {
        make_executable(&target).map_err(|e| {
            ResolveError::fetch(
                name,
                format!("cannot mark {} executable", target.display()),
                e.to_string(),
            )
        })?;
    }

    promote(name, staging, dest)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
