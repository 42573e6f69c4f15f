//! Parse command - extract a unit instance from captured CLI output

use super::{parse_pairs, CommandContext};
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the parse command
#[derive(Parser, Debug, Clone)]
pub struct ParseArgs {
    /// Translation unit to parse with
    #[arg(short = 'u', long)]
    pub unit: String,

    /// File holding the captured show output ("-" reads stdin)
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Identity field of the instance (key=value, repeatable)
    #[arg(long = "id", action = clap::ArgAction::Append)]
    pub id: Vec<String>,
}

impl ParseArgs {
    /// Execute the parse command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ctx.registry()?;
        let unit = registry.get(&self.unit)?;
        let id = parse_pairs(&self.id)?;
        let output = self.read_input()?;

        ctx.output
            .debug(&format!("Parsing {} byte(s) with '{}'", output.len(), self.unit));
        let node = unit.parse(&id, &output)?;

        match (&node, ctx.output.format()) {
            (None, OutputFormat::Human) => {
                ctx.output.warning(&format!("No '{}' instance found", self.unit));
            }
            (node, _) => ctx.output.emit(node)?,
        }
        ctx.output.flush();

        Ok(0)
    }

    fn read_input(&self) -> Result<String> {
        if self.input.as_os_str() == "-" {
            return std::io::read_to_string(std::io::stdin()).context("Failed to read stdin");
        }
        std::fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_parsing() {
        let args = ParseArgs::try_parse_from([
            "parse",
            "--unit",
            "cer_rpd",
            "--input",
            "show.txt",
            "--id",
            "name=node1",
        ])
        .unwrap();
        assert_eq!(args.unit, "cer_rpd");
        assert_eq!(args.input, PathBuf::from("show.txt"));
        assert_eq!(args.id, vec!["name=node1".to_string()]);
    }

    #[test]
    fn test_parse_requires_input() {
        assert!(ParseArgs::try_parse_from(["parse", "--unit", "cer_rpd"]).is_err());
    }
}
