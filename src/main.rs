//! docker-ready - Main entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docker_ready::{
    cli::{Cli, Command, run_logs_command, run_wait_command},
    config::FixtureConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Wait(args) => {
            let config = match &cli.config {
                Some(path) => FixtureConfig::from_file(path)?,
                None => FixtureConfig::resolve()?,
            };
            run_wait_command(args, config).await
        }
        Command::Logs { container } => run_logs_command(&container).await,
    }
}
