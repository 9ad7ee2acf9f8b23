//! Progress display for long-running build stages
//!
//! Provides a spinner during fetch and build stages using indicatif. Status
//! lines printed while a spinner runs go through `println` so they do not
//! tear the spinner line.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner reporter shared by the status observer
pub struct Progress {
    /// Whether progress display is enabled (disabled in quiet and JSON modes)
    enabled: bool,
    /// Current spinner
    bar: Mutex<Option<ProgressBar>>,
}

impl Progress {
    /// Create a new progress reporter
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    /// Create a disabled progress reporter
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Whether anything will be drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Show a spinner with a message, replacing the current one
    pub fn spinner(&self, message: &str) {
        if !self.enabled {
            return;
        }

        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));

        if let Some(previous) = self.slot().replace(spinner) {
            previous.finish_and_clear();
        }
    }

    /// Update the message of the running spinner
    pub fn set_message(&self, message: &str) {
        if let Some(ref bar) = *self.slot() {
            bar.set_message(message.to_string());
        }
    }

    /// Print a line above the spinner (or plainly when none is running)
    pub fn println(&self, line: &str) {
        match *self.slot() {
            Some(ref bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    /// Finish and clear the current spinner
    pub fn finish_and_clear(&self) {
        if let Some(bar) = self.slot().take() {
            bar.finish_and_clear();
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_disabled() {
        let progress = Progress::disabled();
        progress.spinner("test");
        progress.set_message("test");
        progress.finish_and_clear();
        assert!(!progress.is_enabled());
        assert!(progress.slot().is_none());
    }

    #[test]
    fn test_progress_enabled() {
        let progress = Progress::new(true);
        progress.spinner("Fetching fmt");
        assert!(progress.slot().is_some());
        progress.set_message("Building fmt (compile)");
        progress.spinner("Building fmt (install)");
        progress.finish_and_clear();
        assert!(progress.slot().is_none());
    }

    #[test]
    fn test_finish_without_spinner() {
        let progress = Progress::default();
        progress.finish_and_clear();
    }
}
