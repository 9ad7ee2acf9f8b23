//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ResolveError: fatal failures of a dependency pipeline (fetch, build, reprobe)
//! - PrereqError: host toolchain gate failures
//! - ManifestError: issues with the declared dependency list
//! - ProcessError: external commands that could not be executed at all
//! - HttpError: download transport failures

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::Stage;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Dependency resolution failures
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Toolchain prerequisite failures
    #[error(transparent)]
    Prereq(#[from] PrereqError),

    /// Manifest related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// External command errors
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// HTTP client errors
    #[error(transparent)]
    Http(#[from] HttpError),

    /// `--only` / `--exclude` named a dependency the manifest does not declare
    #[error("unknown dependency name(s): {}", names.join(", "))]
    UnknownDependency { names: Vec<String> },

    /// Workspace or output I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal failures of a single dependency's probe → fetch → build → reprobe pipeline
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Source acquisition failed (clone, download, SDK install)
    #[error("{name}: fetch failed: {message}\n{diagnostic}")]
    Fetch {
        name: String,
        message: String,
        diagnostic: String,
    },

    /// Configure stage exited non-zero or could not run
    #[error("{name}: configure failed: {message}\n{diagnostic}")]
    Configure {
        name: String,
        message: String,
        diagnostic: String,
    },

    /// Compile stage exited non-zero or could not run
    #[error("{name}: compile failed: {message}\n{diagnostic}")]
    Compile {
        name: String,
        message: String,
        diagnostic: String,
    },

    /// Install stage failed (command or file copy)
    #[error("{name}: install failed: {message}\n{diagnostic}")]
    Install {
        name: String,
        message: String,
        diagnostic: String,
    },

    /// The freshly built artifact did not pass the probe
    #[error("{name}: built artifact failed verification in {prefix}: {reason}")]
    Reprobe {
        name: String,
        prefix: PathBuf,
        reason: String,
    },

    /// The workspace holds something the engine did not expect
    #[error("{name}: workspace inconsistency at {path}: {message}")]
    WorkspaceInconsistency {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// The pipeline was interrupted; the running external command was killed
    #[error("{name}: interrupted while {state}")]
    Interrupted { name: String, state: String },
}

impl ResolveError {
    /// Creates a failure for the given stage
    pub fn stage_failed(
        stage: Stage,
        name: impl Into<String>,
        message: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let message = message.into();
        let diagnostic = diagnostic.into();
        match stage {
            Stage::Fetch => ResolveError::Fetch {
                name,
                message,
                diagnostic,
            },
            Stage::Configure => ResolveError::Configure {
                name,
                message,
                diagnostic,
            },
            Stage::Compile => ResolveError::Compile {
                name,
                message,
                diagnostic,
            },
            Stage::Install => ResolveError::Install {
                name,
                message,
                diagnostic,
            },
        }
    }

    /// Creates a new Fetch error
    pub fn fetch(
        name: impl Into<String>,
        message: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self::stage_failed(Stage::Fetch, name, message, diagnostic)
    }

    /// Creates a new WorkspaceInconsistency error
    pub fn inconsistency(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        ResolveError::WorkspaceInconsistency {
            name: name.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ResolveError::Fetch { .. } => Some(Stage::Fetch),
            ResolveError::Configure { .. } => Some(Stage::Configure),
            ResolveError::Compile { .. } => Some(Stage::Compile),
            ResolveError::Install { .. } => Some(Stage::Install),
            ResolveError::Reprobe { .. }
            | ResolveError::WorkspaceInconsistency { .. }
            | ResolveError::Interrupted { .. } => None,
        }
    }

    /// Returns the name of the dependency that failed
    pub fn dependency(&self) -> &str {
        match self {
            ResolveError::Fetch { name, .. }
            | ResolveError::Configure { name, .. }
            | ResolveError::Compile { name, .. }
            | ResolveError::Install { name, .. }
            | ResolveError::Reprobe { name, .. }
            | ResolveError::WorkspaceInconsistency { name, .. }
            | ResolveError::Interrupted { name, .. } => name,
        }
    }

    /// Returns the captured tool output, empty when none was recorded
    pub fn diagnostic(&self) -> &str {
        match self {
            ResolveError::Fetch { diagnostic, .. }
            | ResolveError::Configure { diagnostic, .. }
            | ResolveError::Compile { diagnostic, .. }
            | ResolveError::Install { diagnostic, .. } => diagnostic,
            ResolveError::Reprobe { reason, .. } => reason,
            ResolveError::WorkspaceInconsistency { .. } | ResolveError::Interrupted { .. } => "",
        }
    }
}

/// Errors raised by the host toolchain gate
#[derive(Error, Debug)]
pub enum PrereqError {
    /// A required program is not on PATH
    #[error("required program '{tool}' not found")]
    ToolMissing { tool: String },

    /// A program was found but its version is below the minimum
    #[error("{tool} version too old: found {found}, required >= {required}")]
    ToolTooOld {
        tool: String,
        found: String,
        required: String,
    },

    /// The program's version output could not be understood
    #[error("could not determine {tool} version from output: {output}")]
    UnparsableVersion { tool: String, output: String },

    /// A required system library cannot be linked
    #[error("required system library '{library}' not usable: {diagnostic}")]
    LibraryMissing { library: String, diagnostic: String },
}

/// Errors related to the dependency manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse TOML in {path}: {message}")]
    TomlParseError { path: PathBuf, message: String },

    /// Semantically invalid entry
    #[error("invalid dependency '{name}' in {path}: {message}")]
    InvalidEntry {
        path: PathBuf,
        name: String,
        message: String,
    },
}

impl ManifestError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new TomlParseError
    pub fn toml_parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::TomlParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidEntry error
    pub fn invalid_entry(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ManifestError::InvalidEntry {
            path: path.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}

/// An external command could not be executed (as opposed to exiting non-zero)
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program does not exist or is not on PATH
    #[error("program not found: {program}")]
    NotFound { program: String },

    /// Spawning failed for another reason
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Empty argv
    #[error("empty command")]
    EmptyCommand,
}

impl ProcessError {
    /// Classifies a spawn failure
    pub fn from_spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound { program }
        } else {
            ProcessError::Spawn { program, source }
        }
    }
}

/// Errors related to HTTP downloads
#[derive(Error, Debug)]
pub enum HttpError {
    /// Failed to build the client
    #[error("failed to create HTTP client: {message}")]
    Client { message: String },

    /// Network request failed
    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },

    /// Non-success status
    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Timeout
    #[error("timeout while fetching {url}")]
    Timeout { url: String },

    /// Writing the body to disk failed
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failed_maps_to_variant() {
        let err = ResolveError::stage_failed(Stage::Configure, "fmt", "exit code 1", "boom");
        assert!(matches!(err, ResolveError::Configure { .. }));
        assert_eq!(err.stage(), Some(Stage::Configure));
        assert_eq!(err.dependency(), "fmt");
        assert_eq!(err.diagnostic(), "boom");
    }

    #[test]
    fn test_resolve_error_message_names_stage_and_dependency() {
        let err = ResolveError::stage_failed(
            Stage::Compile,
            "libffi",
            "make exited with code 2",
            "undefined reference",
        );
        let msg = err.to_string();
        assert!(msg.contains("libffi"));
        assert!(msg.contains("compile failed"));
        assert!(msg.contains("undefined reference"));
    }

    #[test]
    fn test_reprobe_has_no_stage() {
        let err = ResolveError::Reprobe {
            name: "xxhash".to_string(),
            prefix: PathBuf::from("/ext/xxHash-bin"),
            reason: "found 0.7.0, requires >= 0.8.0".to_string(),
        };
        assert_eq!(err.stage(), None);
        assert!(err.to_string().contains("failed verification"));
    }

    #[test]
    fn test_inconsistency_message() {
        let err = ResolveError::inconsistency("fmt", "/ext/fmt", "expected a directory");
        let msg = err.to_string();
        assert!(msg.contains("workspace inconsistency"));
        assert!(msg.contains("/ext/fmt"));
    }

    #[test]
    fn test_prereq_too_old_message() {
        let err = PrereqError::ToolTooOld {
            tool: "cmake".to_string(),
            found: "3.20.1".to_string(),
            required: "3.24".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("found 3.20.1"));
        assert!(msg.contains("required >= 3.24"));
    }

    #[test]
    fn test_process_error_not_found_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ProcessError::from_spawn("cmake", io);
        assert!(matches!(err, ProcessError::NotFound { .. }));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ProcessError::from_spawn("cmake", io);
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn test_manifest_error_helpers() {
        let err = ManifestError::not_found("/p/extboot.toml");
        assert!(err.to_string().contains("manifest file not found"));

        let err = ManifestError::invalid_entry("/p/extboot.toml", "fmt", "bad version");
        assert!(err.to_string().contains("invalid dependency 'fmt'"));
    }

    #[test]
    fn test_app_error_from_resolve_error() {
        let err: AppError = ResolveError::fetch("fmt", "clone failed", "").into();
        assert!(err.to_string().contains("fetch failed"));
    }

    #[test]
    fn test_app_error_from_manifest_error() {
        let app_err: AppError = ManifestError::not_found("/p/extboot.toml").into();
        assert!(matches!(app_err, AppError::Manifest(_)));
        assert!(app_err.to_string().contains("manifest file not found"));
    }

    #[test]
    fn test_app_error_from_prereq_error() {
        let app_err: AppError = PrereqError::ToolMissing {
            tool: "cmake".to_string(),
        }
        .into();
        assert_eq!(app_err.to_string(), "required program 'cmake' not found");
    }

    #[test]
    fn test_app_error_from_process_error() {
        let app_err: AppError = ProcessError::EmptyCommand.into();
        assert!(matches!(app_err, AppError::Process(ProcessError::EmptyCommand)));
    }

    #[test]
    fn test_app_error_from_http_error() {
        let app_err: AppError = HttpError::Client {
            message: "no TLS backend".to_string(),
        }
        .into();
        assert!(app_err.to_string().contains("failed to create HTTP client"));
    }

    #[test]
    fn test_app_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let app_err: AppError = io_err.into();
        assert!(app_err.to_string().contains("denied"));
    }

    #[test]
    fn test_app_error_unknown_dependency() {
        let err = AppError::UnknownDependency {
            names: vec!["nope".to_string(), "zlib".to_string()],
        };
        assert_eq!(err.to_string(), "unknown dependency name(s): nope, zlib");
    }
}
