//! Plan command - print the ordered change list between two snapshots

use super::{load_snapshot, CommandContext};
use crate::cli::OutputFormat;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the plan command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Translation unit to plan with
    #[arg(short = 'u', long)]
    pub unit: String,

    /// Last known state (JSON or YAML)
    #[arg(short = 'b', long)]
    pub before: Option<PathBuf>,

    /// Desired state (JSON or YAML)
    #[arg(short = 'a', long)]
    pub after: Option<PathBuf>,

    /// Also print the rendered commands
    #[arg(long)]
    pub commands: bool,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ctx.registry()?;
        let unit = registry.get(&self.unit)?;
        let before = load_snapshot(self.before.as_ref())?;
        let after = load_snapshot(self.after.as_ref())?;

        let plan = unit.plan(before.as_ref(), after.as_ref())?;
        let commands = if self.commands {
            Some(unit.render_plan(&plan)?)
        } else {
            None
        };

        if ctx.output.format() != OutputFormat::Human {
            ctx.output.emit(&serde_json::json!({
                "unit": self.unit,
                "operation": plan.operation(),
                "template": plan.template_role(),
                "phases": plan.passes().iter().map(|p| p.phase.as_str()).collect::<Vec<_>>(),
                "changes": plan.changes(),
                "commands": commands.as_ref().map(|c| c.commands()),
            }))?;
            return Ok(0);
        }

        ctx.output.section(&format!(
            "Plan: {} {} ({} change(s))",
            plan.operation(),
            self.unit,
            plan.changes().len()
        ));
        if plan.changes().is_empty() {
            println!("  No changes");
        } else {
            ctx.output.changes(plan.changes());
        }

        if let Some(commands) = &commands {
            ctx.output.section("Commands");
            ctx.output.commands(commands);
        }
        ctx.output.flush();

        Ok(0)
    }
}
