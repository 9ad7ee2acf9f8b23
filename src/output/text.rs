//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Live per-dependency status lines ("Checking for fmt ... found 11.0.2")
//! - Spinners for fetch and build stages
//! - Final summary, with the failing dependency, stage and full tool output

use crate::domain::{Resolution, ResolutionAction};
use crate::output::{OutputFormatter, Verbosity};
use crate::progress::Progress;
use crate::resolver::{ResolveEvent, ResolveObserver, ResolveReport};
use colored::Colorize;
use std::io::Write;

/// Render the status line for an event, if it has one
pub fn status_line(event: &ResolveEvent<'_>, verbosity: Verbosity) -> Option<String> {
    if verbosity == Verbosity::Quiet {
        return None;
    }
    match event {
        ResolveEvent::Found { spec, version } => Some(format!(
            "Checking for {} ... {}",
            spec,
            match version {
                Some(v) => format!("found {}", v).green().to_string(),
                None => "found".green().to_string(),
            }
        )),
        ResolveEvent::NotFound { spec, reason } => {
            let mut line = format!("Checking for {} ... {}", spec, "not found".yellow());
            if verbosity == Verbosity::Verbose {
                line.push_str(&format!("\n  {}", reason.dimmed()));
            }
            Some(line)
        }
        ResolveEvent::Building { spec, prefix } => Some(format!(
            "{} local {} into {}",
            "Building".cyan().bold(),
            spec.name,
            prefix.display()
        )),
        ResolveEvent::Built { spec, version } => Some(match version {
            Some(v) => format!("{} {} {}", "Installed".green().bold(), spec.name, v),
            None => format!("{} {}", "Installed".green().bold(), spec.name),
        }),
        ResolveEvent::Skipped(spec) => Some(format!(
            "{} optional {}",
            "Skipping".dimmed(),
            spec.name
        )),
        ResolveEvent::Checking(_)
        | ResolveEvent::Fetching(_)
        | ResolveEvent::Stage { .. }
        | ResolveEvent::Failed { .. } => None,
    }
}

/// Observer printing live status lines and spinners
pub struct StatusReporter {
    verbosity: Verbosity,
    progress: Progress,
}

impl StatusReporter {
    /// Create a new reporter; spinners only when `show_progress` is set
    pub fn new(verbosity: Verbosity, show_progress: bool) -> Self {
        Self {
            verbosity,
            progress: Progress::new(show_progress && verbosity != Verbosity::Quiet),
        }
    }
}

impl ResolveObserver for StatusReporter {
    fn on_event(&self, event: &ResolveEvent<'_>) {
        match event {
            ResolveEvent::Checking(spec) => {
                self.progress.spinner(&format!("Checking for {}", spec));
            }
            ResolveEvent::Fetching(spec) => {
                self.progress
                    .spinner(&format!("Fetching {} from {}", spec.name, spec.source.describe()));
            }
            ResolveEvent::Stage { spec, stage } => {
                self.progress
                    .spinner(&format!("Building {} ({})", spec.name, stage));
            }
            ResolveEvent::Found { .. }
            | ResolveEvent::NotFound { .. }
            | ResolveEvent::Built { .. }
            | ResolveEvent::Failed { .. } => self.progress.finish_and_clear(),
            ResolveEvent::Building { .. } | ResolveEvent::Skipped(_) => {}
        }

        if let Some(line) = status_line(event, self.verbosity) {
            self.progress.println(&line);
        }
    }
}

/// Text formatter for the final report
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn paint(&self, text: &str, style: fn(&str) -> colored::ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_resolution(&self, resolution: &Resolution) -> String {
        let version = resolution
            .version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let action = match &resolution.action {
            ResolutionAction::Found => self.paint("found", |s| s.green()),
            ResolutionAction::Built => self.paint("built", |s| s.cyan()),
            ResolutionAction::Missing { .. } => self.paint("missing", |s| s.yellow()),
            ResolutionAction::Skipped => self.paint("skipped", |s| s.dimmed()),
        };

        let mut line = format!("  {:<16} {:<10} {}", resolution.name, version, action);
        if self.verbosity == Verbosity::Verbose {
            line.push_str(&format!("  {}", resolution.prefix.display()));
        }
        if let ResolutionAction::Missing { reason } = &resolution.action {
            if self.verbosity == Verbosity::Verbose {
                line.push_str(&format!("\n      {}", reason));
            }
        }
        line
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &ResolveReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if let Some(error) = &report.error {
            let headline = match error.stage() {
                Some(stage) => format!("{} failed during {}", error.dependency(), stage),
                None => format!("{} failed", error.dependency()),
            };
            writeln!(writer, "{} {}", self.paint("error:", |s| s.red().bold()), headline)?;
            writeln!(writer, "{}", error)?;
            return Ok(());
        }

        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }

        let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;
        writeln!(
            writer,
            "Resolved {} dependencies in {:.1}s",
            report.resolutions.len(),
            elapsed
        )?;
        for resolution in &report.resolutions {
            writeln!(writer, "{}", self.format_resolution(resolution))?;
        }

        let missing = report.missing().count();
        if missing > 0 {
            writeln!(writer)?;
            writeln!(
                writer,
                "{} {} missing (run without --check to build)",
                missing,
                if missing == 1 { "dependency" } else { "dependencies" }
            )?;
        }
        Ok(())
    }
}
