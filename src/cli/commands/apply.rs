//! Apply command - execute a transition against a device
//!
//! The device is either an in-process simulator (`--simulate`) or a program
//! spawned with its stdin/stdout as the CLI channel (`--program`).

use super::{load_node, load_snapshot, CommandContext};
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use clap::Parser;
use cliconf::device::Device;
use cliconf::error::Error;
use cliconf::session::{ProcessTransport, Session, SessionError, SessionOptions, SimulatedDevice};
use std::path::PathBuf;

/// Arguments for the apply command
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Translation unit to apply with
    #[arg(short = 'u', long)]
    pub unit: String,

    /// Last known state (JSON or YAML)
    #[arg(short = 'b', long)]
    pub before: Option<PathBuf>,

    /// Desired state (JSON or YAML)
    #[arg(short = 'a', long)]
    pub after: PathBuf,

    /// Apply to an in-process simulated device
    #[arg(long, conflicts_with = "program")]
    pub simulate: bool,

    /// Running configuration loaded into the simulated device
    #[arg(long, requires = "simulate")]
    pub initial: Option<PathBuf>,

    /// Program whose stdin/stdout is the device CLI (e.g. "ssh -tt admin@cer1")
    #[arg(long)]
    pub program: Option<String>,

    /// Prompt pattern of the program's CLI
    #[arg(long, requires = "program")]
    pub prompt: Option<String>,

    /// Read the instance back after applying and compare it with --after
    #[arg(long)]
    pub verify: bool,
}

impl ApplyArgs {
    /// Execute the apply command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let registry = ctx.registry()?;
        let unit = registry.get(&self.unit)?;
        let before = load_snapshot(self.before.as_ref())?;
        let after = load_node(&self.after)?;

        let options = SessionOptions {
            platform: unit.platform(),
            scheduling: ctx.config.session.scheduling,
            timeout: ctx.timeout()?,
            prepare: ctx.config.session.prepare,
        };

        let mut simulator = None;
        let session = if self.simulate {
            let device = SimulatedDevice::new("simulated", unit.platform());
            let handle = device.handle();
            if let Some(path) = &self.initial {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                handle.load_config(&text);
            }
            simulator = Some(handle);
            Session::with_options(device, options)
        } else {
            let program = self
                .program
                .clone()
                .or_else(|| ctx.config.session.program.clone())
                .context("No device given: pass --simulate or --program")?;
            let prompt = self
                .prompt
                .as_deref()
                .or(ctx.config.session.prompt.as_deref());
            ctx.output.info(&format!("Spawning: {}", program));
            let transport = ProcessTransport::spawn(&program, prompt)
                .await
                .map_err(|e| Error::Session(SessionError::from(e)))?;
            Session::with_options(transport, options)
        };

        session.open().await.map_err(Error::from)?;
        let device = Device::new(session, registry);

        if let (Some(handle), None, Some(before)) = (&simulator, &self.initial, &before) {
            // Bring the simulator to the last known state first
            device.apply(&self.unit, None, Some(before)).await?;
            handle.clear_history();
            ctx.output.debug("Seeded simulated device with --before");
        }

        let result = if self.verify {
            device
                .apply_and_verify(&self.unit, before.as_ref(), Some(&after))
                .await
        } else {
            device.apply(&self.unit, before.as_ref(), Some(&after)).await
        };

        if let Err(e) = device.session().close().await {
            ctx.output.debug(&format!("Closing session: {}", e));
        }
        let outcome = result?;
        let running = simulator.as_ref().map(|h| h.running_config());

        if ctx.output.format() != OutputFormat::Human {
            ctx.output.emit(&serde_json::json!({
                "unit": outcome.unit,
                "commands": outcome.commands.commands(),
                "output": outcome.output,
                "running_config": running,
            }))?;
            return Ok(0);
        }

        ctx.output.section("Commands");
        if outcome.is_noop() {
            println!("No changes");
        } else {
            ctx.output.commands(&outcome.commands);
        }

        if !outcome.output.trim().is_empty() {
            ctx.output.section("Device output");
            print!("{}", outcome.output);
            if !outcome.output.ends_with('\n') {
                println!();
            }
        }

        if let Some(running) = running {
            ctx.output.section("Running configuration");
            print!("{}", running);
        }
        ctx.output.flush();

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_args_simulate() {
        let args = ApplyArgs::try_parse_from([
            "apply",
            "--unit",
            "cer_rpd",
            "--after",
            "rpd.yaml",
            "--simulate",
            "--initial",
            "running.txt",
        ])
        .unwrap();
        assert!(args.simulate);
        assert_eq!(args.initial, Some(PathBuf::from("running.txt")));
        assert!(args.program.is_none());
    }

    #[test]
    fn test_apply_args_program() {
        let args = ApplyArgs::try_parse_from([
            "apply",
            "-u",
            "ios_interface",
            "-a",
            "intf.json",
            "--program",
            "ssh -tt admin@lab-sw1",
            "--verify",
        ])
        .unwrap();
        assert_eq!(args.program.as_deref(), Some("ssh -tt admin@lab-sw1"));
        assert!(args.verify);
    }

    #[test]
    fn test_apply_args_conflicts() {
        assert!(ApplyArgs::try_parse_from([
            "apply", "-u", "cer_rpd", "-a", "x.yaml", "--simulate", "--program", "sh"
        ])
        .is_err());
        assert!(ApplyArgs::try_parse_from(["apply", "-u", "cer_rpd", "-a", "x.yaml", "--initial", "r.txt"])
            .is_err());
        assert!(ApplyArgs::try_parse_from(["apply", "-u", "cer_rpd"]).is_err());
    }
}
