//! External command execution
//!
//! This module provides:
//! - `CommandSpec`, a structured command descriptor (argv + env overlay + working directory)
//! - `ProcessRunner`, the seam every external tool invocation goes through
//! - `SystemRunner`, which spawns real processes and streams their output to the log
//!
//! A runner distinguishes three outcomes: the command ran and succeeded, the
//! command ran and exited non-zero (`ProcessOutput::success == false`), and the
//! command could not be executed at all (`ProcessError`).

use crate::error::ProcessError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Structured description of one external command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed verbatim (no shell splitting)
    pub args: Vec<String>,
    /// Working directory; inherited when `None`
    pub cwd: Option<PathBuf>,
    /// Variables merged over the inherited environment
    pub env: BTreeMap<String, String>,
    /// Text written to the child's stdin
    pub stdin: Option<String>,
}

impl CommandSpec {
    /// Create a new command descriptor
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Build a descriptor from an argv list
    pub fn from_argv(argv: &[String]) -> Result<Self, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument
    pub fn arg_path(self, path: impl AsRef<Path>) -> Self {
        let rendered = path.as_ref().display().to_string();
        self.arg(rendered)
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set one overlay variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge an overlay; entries here win over existing ones
    pub fn overlay(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Provide stdin content
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Whether the command exited successfully
    pub success: bool,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// Create a successful output
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failed output
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }

    /// Exit status as shown to users
    pub fn describe_status(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Trait for running external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion, capturing its output
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// Runner that executes real commands
///
/// Children are killed when the returned future is dropped, so cancelling a
/// resolution never leaves a compiler or installer running in the background.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a new system runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        if spec.program.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        debug!(
            command = %spec,
            cwd = ?spec.cwd,
            env = ?spec.env,
            "running external command"
        );

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::from_spawn(&spec.program, e))?;

        if let (Some(input), Some(mut stdin)) = (spec.stdin.as_ref(), child.stdin.take()) {
            // The child may exit before reading everything (e.g. license prompts)
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                warn!(program = %spec.program, error = %e, "failed to write stdin");
            }
            drop(stdin);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) = tokio::join!(
            collect_lines(stdout, "stdout"),
            collect_lines(stderr, "stderr"),
            child.wait()
        );
        let status = status.map_err(|e| ProcessError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        debug!(command = %spec, status = %status, "external command finished");

        Ok(ProcessOutput {
            code: status.code(),
            success: status.success(),
            stdout,
            stderr,
        })
    }
}

/// Read a child stream line by line, logging each line and keeping a copy
///
/// Lines are decoded lossily and the stream is always drained to EOF, so a
/// stray non-UTF-8 byte never closes the pipe under a running child.
async fn collect_lines<R: AsyncRead + Unpin>(reader: Option<R>, stream: &'static str) -> String {
    let mut captured = String::new();
    let Some(reader) = reader else {
        return captured;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                debug!(target: "extboot::output", stream, "{}", line);
                captured.push_str(line);
                captured.push('\n');
            }
            Err(e) => {
                warn!(stream, error = %e, "failed to read command output");
                break;
            }
        }
    }
    captured
}
