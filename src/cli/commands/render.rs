//! Render command - print the commands for a transition
//!
//! Reads the before/after snapshots, plans the transition with the named
//! unit and prints the rendered command text without touching a device.

use super::{load_snapshot, CommandContext};
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the render command
#[derive(Parser, Debug, Clone)]
pub struct RenderArgs {
    /// Translation unit to render with
    #[arg(short = 'u', long)]
    pub unit: String,

    /// Last known state (JSON or YAML); omit to render a creation
    #[arg(short = 'b', long)]
    pub before: Option<PathBuf>,

    /// Desired state (JSON or YAML); omit to render a deletion
    #[arg(short = 'a', long)]
    pub after: Option<PathBuf>,
}

impl RenderArgs {
    /// Execute the render command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ctx.registry()?;
        let unit = registry.get(&self.unit)?;
        let before = load_snapshot(self.before.as_ref())?;
        let after = load_snapshot(self.after.as_ref())?;

        let plan = unit.plan(before.as_ref(), after.as_ref())?;
        let commands = unit
            .render_plan(&plan)
            .with_context(|| format!("Failed to render unit '{}'", self.unit))?;
        ctx.output.debug(&format!(
            "{} plan, {} pass(es), {} command(s)",
            plan.operation(),
            plan.passes().len(),
            commands.len()
        ));

        match ctx.output.format() {
            OutputFormat::Human => {
                if commands.is_empty() {
                    ctx.output.info("No changes");
                }
                ctx.output.commands(&commands);
            }
            _ => ctx.output.emit(&serde_json::json!({
                "unit": self.unit,
                "operation": plan.operation(),
                "commands": commands.commands(),
            }))?,
        }
        ctx.output.flush();

        Ok(0)
    }
}
