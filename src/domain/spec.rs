//! Dependency descriptors
//!
//! A `DependencySpec` is the immutable declaration of one native dependency:
//! how to recognise a usable installation, where its source comes from and
//! which toolchain builds it. Specs are deserialized from the manifest.

use super::VersionString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Declaration of a single native build-time dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Logical name used in status lines and errors
    pub name: String,
    /// Directory name under the workspace root (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Minimum accepted version; `None` accepts any installed version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<VersionString>,
    /// How to recognise a usable installed artifact
    pub probe: ProbeDef,
    /// Where the source (or prebuilt artifact) comes from
    pub source: SourceOrigin,
    /// Which toolchain builds and installs it
    pub build: BackendSpec,
    /// Variables merged over the inherited environment for every build command
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Optional dependencies can be skipped with `--skip-optional`
    #[serde(default)]
    pub optional: bool,
}

impl DependencySpec {
    /// Creates a new dependency spec
    pub fn new(
        name: impl Into<String>,
        probe: ProbeDef,
        source: SourceOrigin,
        build: BackendSpec,
    ) -> Self {
        Self {
            name: name.into(),
            dir: None,
            min_version: None,
            probe,
            source,
            build,
            env: BTreeMap::new(),
            optional: false,
        }
    }

    /// Sets the minimum accepted version (builder pattern)
    pub fn with_min_version(mut self, version: VersionString) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Sets the workspace directory name (builder pattern)
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Adds an environment overlay entry (builder pattern)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Marks the dependency optional (builder pattern)
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Directory name used for `ext/<dir>/` and `ext/<dir>-bin/`
    pub fn dir_name(&self) -> &str {
        self.dir.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min_version {
            Some(v) => write!(f, "{} (>= {})", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Probe strategy used to validate an installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeDef {
    /// Compile (and usually run) a short program against the install prefix
    Compile(CompileProbe),
    /// Run a tool with a version flag and parse its output
    Command(CommandProbe),
}

/// Source language of a compile probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProbeLanguage {
    #[serde(rename = "c")]
    C,
    #[default]
    #[serde(rename = "c++")]
    Cxx,
}

impl ProbeLanguage {
    /// File extension for the materialized probe source
    pub fn extension(&self) -> &'static str {
        match self {
            ProbeLanguage::C => "c",
            ProbeLanguage::Cxx => "cpp",
        }
    }

    /// Environment variable naming the compiler, and its fallback
    pub fn compiler_var(&self) -> (&'static str, &'static str) {
        match self {
            ProbeLanguage::C => ("CC", "cc"),
            ProbeLanguage::Cxx => ("CXX", "c++"),
        }
    }
}

/// Compile-and-run probe definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompileProbe {
    #[serde(default)]
    pub language: ProbeLanguage,
    /// Program text; when absent a trivial `main` is only linked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// Static archives expected under the prefix (`fmt` → `libfmt.a`)
    #[serde(default)]
    pub static_libs: Vec<String>,
    /// Additional libraries linked with `-l` (system or prefix)
    #[serde(default)]
    pub libs: Vec<String>,
    /// Files (relative to the prefix) that must exist before compiling
    #[serde(default)]
    pub required_files: Vec<PathBuf>,
    /// Run the compiled program and parse its stdout as the version
    #[serde(default = "default_true")]
    pub execute: bool,
}

/// Command-version probe definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandProbe {
    pub program: String,
    #[serde(default = "default_version_args")]
    pub args: Vec<String>,
    /// Look for the program under `<prefix>/bin` (or the prefix itself) instead of PATH
    #[serde(default)]
    pub in_prefix: bool,
}

impl CommandProbe {
    /// Creates a `--version` probe for a program on PATH
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: default_version_args(),
            in_prefix: false,
        }
    }
}

/// Origin of a dependency's source tree or binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceOrigin {
    /// Version-control clone at a pinned tag or branch
    Git { url: String, tag: String },
    /// Streamed download of a single artifact
    Download {
        url: String,
        /// File name inside the dependency directory
        file: String,
        /// Mark the downloaded file executable (standalone tools)
        #[serde(default)]
        executable: bool,
    },
    /// Package installed by a platform SDK component manager
    Sdk {
        #[serde(default = "default_sdk_manager")]
        manager: String,
        package: String,
        #[serde(default = "default_true")]
        accept_licenses: bool,
    },
}

impl SourceOrigin {
    /// Short description for status lines
    pub fn describe(&self) -> String {
        match self {
            SourceOrigin::Git { url, tag } => format!("{} @ {}", url, tag),
            SourceOrigin::Download { url, .. } => url.clone(),
            SourceOrigin::Sdk { package, .. } => format!("sdk package {}", package),
        }
    }
}

/// Build backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSpec {
    /// Out-of-tree CMake build with a native install target
    Cmake {
        #[serde(default)]
        options: Vec<String>,
        /// Directory (relative to the checkout) holding the top-level CMakeLists.txt
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_subdir: Option<PathBuf>,
    },
    /// autogen + configure + make
    Autotools {
        /// Bootstrap script run before configure; empty string skips it
        #[serde(default = "default_autogen")]
        autogen: String,
        #[serde(default)]
        configure_flags: Vec<String>,
    },
    /// Configure and build, then copy files into the prefix by hand
    Manual {
        /// Configure argv, run in the checkout
        #[serde(default)]
        configure: Vec<String>,
        /// Build argv; defaults to a parallel `make`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        build: Option<Vec<String>>,
        /// Files (relative to the checkout) copied into `<prefix>/lib/`
        #[serde(default)]
        artifacts: Vec<PathBuf>,
        /// Directory trees (relative to the checkout) copied into `<prefix>/include/`
        #[serde(default)]
        include_dirs: Vec<PathBuf>,
    },
    /// The fetched artifact is the installation (downloads, SDK packages)
    Prebuilt,
}

impl BackendSpec {
    /// Human-readable backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendSpec::Cmake { .. } => "cmake",
            BackendSpec::Autotools { .. } => "autotools",
            BackendSpec::Manual { .. } => "manual",
            BackendSpec::Prebuilt => "prebuilt",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_sdk_manager() -> String {
    "sdkmanager".to_string()
}

fn default_autogen() -> String {
    "autogen.sh".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt_spec() -> DependencySpec {
        DependencySpec::new(
            "fmt",
            ProbeDef::Compile(CompileProbe {
                fragment: Some("int main() { return 0; }".to_string()),
                static_libs: vec!["fmt".to_string()],
                execute: true,
                ..Default::default()
            }),
            SourceOrigin::Git {
                url: "https://github.com/fmtlib/fmt".to_string(),
                tag: "11.0.2".to_string(),
            },
            BackendSpec::Cmake {
                options: Vec::new(),
                source_subdir: None,
            },
        )
    }

    #[test]
    fn test_dir_name_defaults_to_name() {
        let spec = fmt_spec();
        assert_eq!(spec.dir_name(), "fmt");
        let spec = spec.with_dir("fmtlib");
        assert_eq!(spec.dir_name(), "fmtlib");
    }

    #[test]
    fn test_display_includes_min_version() {
        let spec = fmt_spec().with_min_version(VersionString::parse("11.0").unwrap());
        assert_eq!(spec.to_string(), "fmt (>= 11.0)");
        assert_eq!(fmt_spec().to_string(), "fmt");
    }

    #[test]
    fn test_deserialize_from_toml() {
        let text = r#"
name = "libffi"
min_version = "3.4.7"

[probe]
kind = "compile"
language = "c"
fragment = "int main() { return 0; }"
static_libs = ["ffi"]
required_files = ["lib/libffi.a"]

[source]
kind = "git"
url = "https://github.com/libffi/libffi.git"
tag = "v3.4.7"

[build]
kind = "autotools"
configure_flags = ["--disable-shared", "--enable-static"]

[env]
CFLAGS = "-fPIC"
"#;
        let spec: DependencySpec = toml::from_str(text).unwrap();
        assert_eq!(spec.name, "libffi");
        assert_eq!(spec.min_version, Some(VersionString::parse("3.4.7").unwrap()));
        match &spec.probe {
            ProbeDef::Compile(probe) => {
                assert_eq!(probe.language, ProbeLanguage::C);
                assert!(probe.execute);
                assert_eq!(probe.required_files, vec![PathBuf::from("lib/libffi.a")]);
            }
            other => panic!("unexpected probe {:?}", other),
        }
        match &spec.build {
            BackendSpec::Autotools { autogen, .. } => assert_eq!(autogen, "autogen.sh"),
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(spec.env.get("CFLAGS").map(String::as_str), Some("-fPIC"));
        assert!(!spec.optional);
    }

    #[test]
    fn test_command_probe_defaults() {
        let probe: CommandProbe = toml::from_str(r#"program = "cmake""#).unwrap();
        assert_eq!(probe.args, vec!["--version"]);
        assert!(!probe.in_prefix);
    }

    #[test]
    fn test_sdk_source_defaults() {
        let source: SourceOrigin =
            toml::from_str("kind = \"sdk\"\npackage = \"build-tools;34.0.0\"").unwrap();
        match source {
            SourceOrigin::Sdk {
                manager,
                accept_licenses,
                ..
            } => {
                assert_eq!(manager, "sdkmanager");
                assert!(accept_licenses);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendSpec::Prebuilt.name(), "prebuilt");
        let manual: BackendSpec = toml::from_str("kind = \"manual\"").unwrap();
        assert_eq!(manual.name(), "manual");
    }
}
