//! JSON output formatter for machine processing
//!
//! This module provides:
//! - JSON serialization of resolution reports
//! - Structured failure information (dependency, stage, diagnostic)

use crate::domain::Resolution;
use crate::error::ResolveError;
use crate::output::{OutputFormatter, Verbosity};
use crate::resolver::ResolveReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Verbosity level affects detail in output
    verbosity: Verbosity,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// JSON representation of the full report
#[derive(Serialize)]
struct JsonOutput<'a> {
    /// Whether every dependency is usable
    success: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    /// Per-dependency results, in declaration order
    dependencies: &'a [Resolution],
    /// Fatal failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError<'a>>,
}

/// JSON representation of a fatal failure
#[derive(Serialize)]
struct JsonError<'a> {
    dependency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    message: String,
    /// Captured tool output (omitted in quiet mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<&'a str>,
}

impl<'a> JsonError<'a> {
    fn new(error: &'a ResolveError, verbosity: Verbosity) -> Self {
        let message = match error {
            ResolveError::Fetch { message, .. }
            | ResolveError::Configure { message, .. }
            | ResolveError::Compile { message, .. }
            | ResolveError::Install { message, .. }
            | ResolveError::WorkspaceInconsistency { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            dependency: error.dependency(),
            stage: error.stage().map(|s| s.as_str()),
            message,
            diagnostic: (verbosity != Verbosity::Quiet).then(|| error.diagnostic()),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ResolveReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = JsonOutput {
            success: report.is_success(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            dependencies: &report.resolutions,
            error: report
                .error
                .as_ref()
                .map(|e| JsonError::new(e, self.verbosity)),
        };
        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)
    }
}
