//! Terminal output
//!
//! All user-facing messages go through [`Reporter`], which filters by
//! [`Verbosity`] and writes colored, prefixed lines to stderr.

use colored::Colorize;
use std::time::Duration;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

/// Writes status messages for tasks and their workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Reporter { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[sluice]".cyan(), message);
        }
    }

    /// Print warning message
    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[warn]".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "[error]".red().bold(), message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[debug]".dimmed(), message);
        }
    }

    /// Print task start message
    pub fn task_start(&self, task_name: &str) {
        self.info(&format!("Starting '{}'...", task_name.cyan()));
    }

    /// Print task complete message
    pub fn task_finish(&self, task_name: &str, elapsed: Duration) {
        self.info(&format!(
            "Finished '{}' after {}",
            task_name.cyan(),
            format_elapsed(elapsed).magenta()
        ));
    }

    /// Print task failure message
    pub fn task_failed(&self, task_name: &str, elapsed: Duration) {
        self.error(&format!(
            "'{}' errored after {}",
            task_name.cyan(),
            format_elapsed(elapsed).magenta()
        ));
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter::new(Verbosity::Normal)
    }
}

/// Format a duration the way task timings are shown (`850 ms`, `1.42 s`)
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{} ms", millis)
    } else {
        format!("{:.2} s", elapsed.as_secs_f64())
    }
}
