//! IntunePack agent entry point.

mod app;
mod config;
mod control_plane;
mod poller;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, default_config_path};

#[derive(Parser)]
#[command(
    name = "intunepack-agent",
    version,
    about = "Packages installers and publishes them as Intune Win32 apps"
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "INTUNEPACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the control plane and process jobs until interrupted
    Run,
    /// Validate configuration and tool presence without side effects
    Check,
    /// Download the packaging tools
    Setup,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting IntunePack agent"
    );

    let config_path = cli.config.unwrap_or_else(default_config_path);

    match cli.command {
        Command::Run => {
            let config = Config::load(&config_path)?;
            config.validate()?;
            tracing::info!(path = %config_path.display(), "configuration loaded");

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(app::run(config))?;

            tracing::info!("agent shut down cleanly");
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let issues = match Config::load(&config_path) {
                Ok(config) => app::check(&config),
                Err(e) => vec![e.to_string()],
            };
            Ok(report("check", &issues))
        }
        Command::Setup => {
            let rt = tokio::runtime::Runtime::new()?;
            let failures = rt.block_on(app::setup(&config_path))?;
            Ok(report("setup", &failures))
        }
    }
}

/// Prints each issue and maps them to an exit code.
fn report(command: &str, issues: &[String]) -> ExitCode {
    if issues.is_empty() {
        println!("{command}: ok");
        return ExitCode::SUCCESS;
    }

    eprintln!("{command}: {} issue(s)", issues.len());
    for issue in issues {
        eprintln!("  - {issue}");
    }
    ExitCode::FAILURE
}
