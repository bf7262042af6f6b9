//! Output formatting for CLI results

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// Output format for CLI results
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned key/value table (default)
    #[default]
    Table,
    /// JSON output for machine processing
    Json,
}

/// Writes command results in the selected format
pub struct OutputWriter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print a value as pretty JSON
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
        }
    }

    /// One aligned table row
    pub fn row(&self, label: &str, value: impl std::fmt::Display) {
        if !self.quiet {
            println!("{:<18} {}", label, value);
        }
    }

    pub fn print(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("info: {}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("ok: {}", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("warning: {}", message);
        }
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}
