//! Subcommands module for cliconf CLI
//!
//! This module contains all the subcommand implementations.

pub mod apply;
pub mod parse;
pub mod plan;
pub mod render;
pub mod units;

use crate::cli::output::OutputFormatter;
use anyhow::{bail, Context, Result};
use cliconf::config::{self, Config};
use cliconf::model::{ConfigNode, Value};
use cliconf::units::UnitRegistry;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Timeout given on the command line, unparsed
    pub timeout: Option<String>,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.output, cli.verbosity(), &config.colors);

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            timeout: cli.timeout.clone(),
        }
    }

    /// Effective per-exchange timeout: `--timeout`, else the configured default
    pub fn timeout(&self) -> Result<Duration> {
        match &self.timeout {
            Some(text) => config::parse_duration(text)
                .with_context(|| format!("Invalid --timeout value: {}", text)),
            None => Ok(self.config.defaults.timeout),
        }
    }

    /// Built-in units plus every definition under the configured unit paths
    pub fn registry(&self) -> Result<UnitRegistry> {
        let mut registry = UnitRegistry::with_builtins().context("Failed to compile built-in units")?;

        for dir in &self.config.unit_paths {
            if !dir.is_dir() {
                self.output
                    .warning(&format!("Unit path not found: {}", dir.display()));
                continue;
            }
            let count = registry
                .load_dir(dir)
                .with_context(|| format!("Failed to load units from {}", dir.display()))?;
            self.output
                .debug(&format!("Loaded {} unit(s) from {}", count, dir.display()));
        }

        Ok(registry)
    }
}

/// Read a configuration node from a JSON or YAML file (by extension; other
/// extensions are read as YAML)
pub fn load_node(path: &Path) -> Result<ConfigNode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let node: ConfigNode = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {}", path.display()))?,
    };

    node.validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(node)
}

/// [`load_node`] for an optional snapshot argument
pub fn load_snapshot(path: Option<&PathBuf>) -> Result<Option<ConfigNode>> {
    path.map(|p| load_node(p)).transpose()
}

/// Build a node from `key=value` pairs; values are read as YAML scalars
pub fn parse_pairs(pairs: &[String]) -> Result<ConfigNode> {
    let mut node = ConfigNode::new();

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Expected key=value, got: {}", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty key in: {}", pair);
        }
        let value = match serde_yaml::from_str::<Value>(raw) {
            Ok(value) if value.is_scalar() => value,
            _ => Value::Str(raw.to_string()),
        };
        node = node.with(key, value);
    }

    Ok(node)
}
