//! `wait` and `logs` commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use crate::config::FixtureConfig;
use crate::gate::StartupGate;
use crate::runtime::{ContainerRuntime, DockerRuntime, LogOptions};
use crate::wait::wait_for::WaitFor;

#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Container id or name
    pub container: String,

    /// Wait for a log line containing TEXT (repeatable)
    #[arg(long = "log", value_name = "TEXT")]
    pub logs: Vec<String>,

    /// Wait for lines containing each TEXT, in the given order
    #[arg(long = "sequence", value_name = "TEXT")]
    pub sequence: Vec<String>,

    /// Wait for TEXT anywhere in the full log, fetched on every poll
    #[arg(long = "full-log", value_name = "TEXT")]
    pub full_log: Vec<String>,

    /// Wait for an HTTP endpoint to answer
    #[arg(long, value_name = "URL")]
    pub http: Option<String>,

    /// HTTP method for --http (default HEAD)
    #[arg(long, requires = "http")]
    pub method: Option<String>,

    /// Accepted statuses for --http, e.g. 204 or 200..399
    #[arg(long, requires = "http", value_name = "PATTERN")]
    pub status: Option<String>,

    /// Timeout per condition in seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Name shown in messages
    #[arg(long)]
    pub name: Option<String>,

    /// Do not echo the container's output
    #[arg(short, long)]
    pub quiet: bool,
}

impl WaitArgs {
    /// Conditions in the order they are checked: log lines, the sequence,
    /// full-log matches, then the HTTP probe.
    pub fn conditions(&self) -> Vec<WaitFor> {
        let mut conditions: Vec<WaitFor> =
            self.logs.iter().map(WaitFor::log_message).collect();
        if !self.sequence.is_empty() {
            conditions.push(WaitFor::log_message_sequence(self.sequence.clone()));
        }
        conditions.extend(self.full_log.iter().map(WaitFor::full_log_message));
        if let Some(url) = &self.http {
            conditions.push(WaitFor::HttpPing {
                url: url.clone(),
                method: self.method.clone(),
                status: self.status.clone(),
            });
        }
        conditions
    }

    /// Apply command line overrides on top of `config`.
    pub fn apply(&self, mut config: FixtureConfig) -> FixtureConfig {
        if let Some(secs) = self.timeout {
            config.wait_timeout = Duration::from_secs(secs);
        }
        if self.quiet {
            config.print_logs = false;
        }
        config.wait_for.extend(self.conditions());
        config
    }
}

/// Run the `wait` command against the local Docker daemon.
pub async fn run_wait_command(args: WaitArgs, config: FixtureConfig) -> anyhow::Result<()> {
    let config = args.apply(config);
    if config.wait_for.is_empty() {
        anyhow::bail!("nothing to wait for: pass --log, --sequence, --full-log or --http");
    }

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::connect().await?);
    let mut gate = StartupGate::new(runtime, args.container.clone()).with_config(config);
    if let Some(name) = &args.name {
        gate = gate.with_name(name.clone());
    }

    let result = gate.start().await;
    gate.close().await;
    result.with_context(|| format!("container '{}' did not become ready", args.container))?;

    if !args.quiet {
        eprintln!("{} is ready", gate.describe());
    }
    Ok(())
}

/// Run the `logs` command: print everything written so far.
pub async fn run_logs_command(container: &str) -> anyhow::Result<()> {
    let runtime = DockerRuntime::connect().await?;
    let log = runtime
        .current_log(container, LogOptions::snapshot())
        .await
        .with_context(|| format!("failed to read log of '{container}'"))?;
    print!("{log}");
    Ok(())
}
