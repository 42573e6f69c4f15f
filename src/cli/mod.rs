//! CLI module for cliconf
//!
//! This module provides the command-line interface for cliconf,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cliconf - translate configuration trees into device CLI commands
///
/// Renders before/after configuration snapshots into the minimal ordered
/// command sequence for a network device, and parses CLI output back.
#[derive(Parser, Debug, Clone)]
#[command(name = "cliconf")]
#[command(author = "cliconf Contributors")]
#[command(version)]
#[command(about = "Translate configuration trees into network-device CLI commands", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Per-exchange device timeout (e.g. "30s", "2m", or plain seconds)
    #[arg(long, global = true)]
    pub timeout: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "CLICONF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List registered translation units
    Units(commands::units::UnitsArgs),

    /// Render the commands moving a unit from one snapshot to another
    Render(commands::render::RenderArgs),

    /// Show the ordered change list between two snapshots
    Plan(commands::plan::PlanArgs),

    /// Parse a unit instance out of captured CLI output
    Parse(commands::parse::ParseArgs),

    /// Apply a transition to a device and print its output
    Apply(commands::apply::ApplyArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["cliconf", "units"]).unwrap();
        assert!(matches!(cli.command, Commands::Units(_)));
        assert_eq!(cli.output, OutputFormat::Human);
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["cliconf", "-vvvv", "units"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cliconf",
            "render",
            "--unit",
            "cer_rpd",
            "--after",
            "rpd.yaml",
            "--output",
            "json",
            "--timeout",
            "5s",
            "--no-color",
        ])
        .unwrap();
        assert!(cli.is_json());
        assert!(cli.no_color);
        assert_eq!(cli.timeout.as_deref(), Some("5s"));
    }

    #[test]
    fn test_unknown_output_format_rejected() {
        assert!(Cli::try_parse_from(["cliconf", "--output", "xml", "units"]).is_err());
    }
}
