//! cliconf - CLI configuration translation engine
//!
//! This is the main entry point for the cliconf CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use cliconf::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; an explicit --config that cannot be read is fatal
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            if cli.verbosity() >= 1 {
                eprintln!("Warning: Failed to load config: {:#}", e);
            }
            Config::default()
        }
    };

    // Initialize logging based on verbosity and config
    init_logging(cli.verbosity(), &config.logging);

    if cli.verbosity() >= 2 {
        eprintln!("cliconf v{}", VERSION);
    }

    let exit_code = match run(&cli, config).await {
        Ok(code) => code,
        Err((ctx, e)) => {
            ctx.output.error(&format!("{:#}", e));
            exit_code_for(&e)
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &Cli, config: Config) -> std::result::Result<i32, (CommandContext, anyhow::Error)> {
    let mut ctx = CommandContext::new(cli, config);

    let result: Result<i32> = match &cli.command {
        Commands::Units(args) => args.execute(&mut ctx).await,
        Commands::Render(args) => args.execute(&mut ctx).await,
        Commands::Plan(args) => args.execute(&mut ctx).await,
        Commands::Parse(args) => args.execute(&mut ctx).await,
        Commands::Apply(args) => args.execute(&mut ctx).await,
    };

    result.map_err(|e| (ctx, e))
}

/// Map an error to the process exit status, using the library's codes when
/// the root cause is a library error.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<cliconf::error::Error>())
        .map(cliconf::error::Error::exit_code)
        .unwrap_or(1)
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr; stdout carries command output
    match logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init(),
    }
}
