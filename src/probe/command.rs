//! Command-version probes (`tool --version`)

use crate::domain::{CommandProbe, ProbeResult, VersionString};
use crate::process::{CommandSpec, ProcessRunner};
use std::path::{Path, PathBuf};

/// Run the tool with its version flag and parse the reported version
///
/// The first `version X.Y.Z` token in the combined output wins; tools that
/// print a bare dotted version are accepted as well.
pub async fn probe_command(
    runner: &dyn ProcessRunner,
    probe: &CommandProbe,
    prefix: &Path,
) -> ProbeResult {
    let program = if probe.in_prefix {
        match locate_in_prefix(prefix, &probe.program) {
            Some(path) => path.display().to_string(),
            None => {
                return ProbeResult::unsatisfied(format!(
                    "{} not found under {}",
                    probe.program,
                    prefix.display()
                ))
            }
        }
    } else {
        probe.program.clone()
    };

    let command = CommandSpec::new(program).args(probe.args.iter().cloned());
    let output = match runner.run(&command).await {
        Ok(output) => output,
        Err(e) => return ProbeResult::unsatisfied(e.to_string()),
    };
    if !output.success {
        return ProbeResult::unsatisfied(format!(
            "`{}` failed ({}): {}",
            command,
            output.describe_status(),
            output.combined()
        ));
    }

    let combined = output.combined();
    let version = VersionString::extract_after_keyword(&combined)
        .or_else(|| VersionString::extract(&combined));
    match version {
        Some(version) => ProbeResult::Satisfied(Some(version)),
        None => ProbeResult::unsatisfied(format!(
            "could not parse a version from `{}` output: {}",
            command, combined
        )),
    }
}

/// Find an executable under `<prefix>/bin/` or directly in `<prefix>/`
fn locate_in_prefix(prefix: &Path, program: &str) -> Option<PathBuf> {
    [prefix.join("bin").join(program), prefix.join(program)]
        .into_iter()
        .find(|p| p.is_file())
}
