//! Units command - list registered translation units

use super::CommandContext;
use crate::cli::OutputFormat;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;

/// Arguments for the units command
#[derive(Parser, Debug, Clone)]
pub struct UnitsArgs {
    /// Only list units for this platform (e.g. casa_cer, cisco_ios)
    #[arg(long)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnitSummary {
    name: String,
    platform: String,
    identity: Vec<String>,
    description: String,
}

impl UnitsArgs {
    /// Execute the units command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ctx.registry()?;
        let platform = match &self.platform {
            Some(p) => Some(p.parse::<cliconf::session::Platform>()?),
            None => None,
        };

        let mut summaries = Vec::new();
        for name in registry.names() {
            let unit = registry.get(name)?;
            if platform.is_some_and(|p| p != unit.platform()) {
                continue;
            }
            summaries.push(UnitSummary {
                name: name.to_string(),
                platform: unit.platform().to_string(),
                identity: unit.identity().to_vec(),
                description: unit.description().to_string(),
            });
        }

        if ctx.output.format() != OutputFormat::Human {
            ctx.output.emit(&summaries)?;
            return Ok(0);
        }

        if summaries.is_empty() {
            ctx.output.warning("No units registered");
            return Ok(0);
        }

        let rows: Vec<Vec<String>> = summaries
            .iter()
            .map(|s| {
                vec![
                    s.name.clone(),
                    s.platform.clone(),
                    s.identity.join(","),
                    s.description.clone(),
                ]
            })
            .collect();
        ctx.output
            .table(&["UNIT", "PLATFORM", "IDENTITY", "DESCRIPTION"], &rows);
        ctx.output.flush();

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_args_parsing() {
        let args = UnitsArgs::try_parse_from(["units"]).unwrap();
        assert!(args.platform.is_none());

        let args = UnitsArgs::try_parse_from(["units", "--platform", "casa_cer"]).unwrap();
        assert_eq!(args.platform.as_deref(), Some("casa_cer"));
    }
}
