//! Compile-and-run probes

use crate::domain::{CompileProbe, ProbeResult, VersionString};
use crate::process::{CommandSpec, ProcessRunner};
use crate::workspace::library_dirs;
use std::path::{Path, PathBuf};

/// Program linked when a probe has no fragment of its own
const TRIVIAL_MAIN: &str = "int main(void) { return 0; }\n";

/// Compile the probe program against `prefix` (or only system paths when
/// `None`), run it when asked, and parse the printed version.
///
/// The temporary build directory is removed on every path out of this
/// function.
pub async fn probe_compile(
    runner: &dyn ProcessRunner,
    probe: &CompileProbe,
    prefix: Option<&Path>,
) -> ProbeResult {
    let mut lib_dirs = Vec::new();
    let mut archives = Vec::new();

    if let Some(prefix) = prefix {
        for file in &probe.required_files {
            let path = prefix.join(file);
            if !path.exists() {
                return ProbeResult::unsatisfied(format!(
                    "required file {} is missing",
                    path.display()
                ));
            }
        }

        lib_dirs = library_dirs(prefix);
        for lib in &probe.static_libs {
            match find_archive(&lib_dirs, lib) {
                Some(path) => archives.push(path),
                None => {
                    return ProbeResult::unsatisfied(format!(
                        "static library lib{}.a not found under {}",
                        lib,
                        prefix.display()
                    ))
                }
            }
        }
    } else if !probe.static_libs.is_empty() {
        return ProbeResult::unsatisfied("static libraries require an install prefix");
    }

    let tmp = match tempfile::Builder::new().prefix("extboot-probe").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            return ProbeResult::unsatisfied(format!("cannot create probe directory: {}", e))
        }
    };

    let source = tmp
        .path()
        .join(format!("probe.{}", probe.language.extension()));
    let program = probe.fragment.as_deref().unwrap_or(TRIVIAL_MAIN);
    if let Err(e) = std::fs::write(&source, program) {
        return ProbeResult::unsatisfied(format!("cannot write probe source: {}", e));
    }
    let exe = tmp.path().join("probe");

    let (var, fallback) = probe.language.compiler_var();
    let compiler = std::env::var(var).unwrap_or_else(|_| fallback.to_string());

    let mut compile = CommandSpec::new(compiler).arg_path(&source);
    if let Some(prefix) = prefix {
        compile = compile.arg(format!("-I{}", prefix.join("include").display()));
    }
    for dir in &lib_dirs {
        compile = compile.arg(format!("-L{}", dir.display()));
    }
    for archive in &archives {
        compile = compile.arg_path(archive);
    }
    for lib in &probe.libs {
        compile = compile.arg(format!("-l{}", lib));
    }
    let compile = compile.arg("-o").arg_path(&exe).current_dir(tmp.path());

    match runner.run(&compile).await {
        Ok(output) if output.success => {}
        Ok(output) => {
            return ProbeResult::unsatisfied(format!(
                "probe compilation failed ({}): {}",
                output.describe_status(),
                output.combined()
            ))
        }
        Err(e) => return ProbeResult::unsatisfied(format!("compiler unavailable: {}", e)),
    }

    if probe.fragment.is_none() || !probe.execute {
        return ProbeResult::Satisfied(None);
    }

    let run = CommandSpec::new(exe.display().to_string()).current_dir(tmp.path());
    match runner.run(&run).await {
        Ok(output) if output.success => match VersionString::extract(&output.stdout) {
            Some(version) => ProbeResult::Satisfied(Some(version)),
            None => ProbeResult::unsatisfied(format!(
                "probe printed no version: '{}'",
                output.stdout.trim()
            )),
        },
        Ok(output) => ProbeResult::unsatisfied(format!(
            "probe program failed ({}): {}",
            output.describe_status(),
            output.combined()
        )),
        Err(e) => ProbeResult::unsatisfied(format!("probe program could not run: {}", e)),
    }
}

fn find_archive(lib_dirs: &[PathBuf], lib: &str) -> Option<PathBuf> {
    let file = format!("lib{}.a", lib);
    lib_dirs.iter().map(|d| d.join(&file)).find(|p| p.is_file())
}
