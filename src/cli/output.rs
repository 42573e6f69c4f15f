//! Output formatting module for cliconf
//!
//! Provides colored human output and structured JSON/YAML output.

use colored::{Color, Colorize};
use serde::Serialize;
use std::io::{self, Write};

use cliconf::config::ColorsConfig;
use cliconf::model::CommandLine;
use cliconf::planner::Change;

use super::OutputFormat;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Selected output format
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
    /// Colors for additions, removals, modifications and headings
    palette: Palette,
}

struct Palette {
    added: Color,
    removed: Color,
    changed: Color,
    highlight: Color,
}

impl Palette {
    fn from_config(colors: &ColorsConfig) -> Self {
        Self {
            added: parse_color(&colors.added, Color::Green),
            removed: parse_color(&colors.removed, Color::Red),
            changed: parse_color(&colors.changed, Color::Yellow),
            highlight: parse_color(&colors.highlight, Color::Cyan),
        }
    }
}

fn parse_color(name: &str, fallback: Color) -> Color {
    name.parse().unwrap_or(fallback)
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8, colors: &ColorsConfig) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && colors.enabled && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            format,
            verbosity,
            palette: Palette::from_config(colors),
        }
    }

    /// Selected output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn structured(&self) -> bool {
        self.format != OutputFormat::Human
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.structured() {
            return;
        }

        if self.use_color {
            println!("{}", title.color(self.palette.highlight).bold());
        } else {
            println!("{}", title);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.format == OutputFormat::Json {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Json {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (shown with -v)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.structured() {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "INFO:".blue(), message);
        } else {
            eprintln!("INFO: {}", message);
        }
    }

    /// Print a debug message (shown with -vv)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.structured() {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "DEBUG:".magenta(), message);
        } else {
            eprintln!("DEBUG: {}", message);
        }
    }

    /// Print rendered commands, negations highlighted as removals
    pub fn commands(&self, commands: &CommandLine) {
        for line in commands.iter() {
            if !self.use_color {
                println!("{}", line);
            } else if line.trim_start().starts_with("no ") {
                println!("{}", line.color(self.palette.removed));
            } else {
                println!("{}", line.color(self.palette.added));
            }
        }
    }

    /// Print a change list, one change per line
    pub fn changes(&self, changes: &[Change]) {
        for change in changes {
            let text = change.to_string();
            if !self.use_color {
                println!("  {}", text);
                continue;
            }
            let color = match change {
                Change::Set { .. } | Change::AddEntry { .. } => self.palette.added,
                Change::Clear { .. } | Change::RemoveEntry { .. } => self.palette.removed,
                Change::Modify { .. } => self.palette.changed,
            };
            println!("  {}", text.color(color));
        }
    }

    /// Print a table with headers
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.len());
                }
            }
        }

        let header_line = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        if self.use_color {
            println!("{}", header_line.bold());
        } else {
            println!("{}", header_line);
        }

        for row in rows {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", line.trim_end());
        }
    }

    /// Print a value in the structured format selected with `--output`
    pub fn emit<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml | OutputFormat::Human => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }

    /// Flush output
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_falls_back() {
        assert_eq!(parse_color("blue", Color::Red), Color::Blue);
        assert_eq!(parse_color("no-such-color", Color::Red), Color::Red);
    }

    #[test]
    fn test_structured_formats_suppress_sections() {
        let colors = ColorsConfig::default();
        let human = OutputFormatter::new(false, OutputFormat::Human, 0, &colors);
        let json = OutputFormatter::new(false, OutputFormat::Json, 0, &colors);
        assert!(!human.structured());
        assert!(json.structured());
        assert_eq!(json.format(), OutputFormat::Json);
    }
}
