//! CLI command handling.
//!
//! Provides subcommands for:
//! - Waiting until a running container is ready (`wait`)
//! - Printing a container's current log (`logs`)

mod wait;

pub use wait::{WaitArgs, run_logs_command, run_wait_command};

use std::path::PathBuf;

use clap::{ArgAction, ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "docker-ready")]
#[command(about = "Wait for a running container to become ready")]
#[command(
    long_about = "Attaches to a running container's output and blocks until its readiness conditions hold.\nExamples:\n  docker-ready wait db --log 'ready to accept connections'\n  docker-ready wait web --http http://localhost:8080/health --status 200..299"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path (optional, uses env vars by default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait until a container is ready
    #[command(
        about = "Wait for readiness conditions",
        long_about = "Conditions run in order, each with its own timeout.\nExample: docker-ready wait db --sequence 'init done' --sequence 'ready'"
    )]
    Wait(WaitArgs),

    /// Print the log written so far
    Logs {
        /// Container id or name
        container: String,
    },
}

impl Cli {
    /// Filter directive for the tracing subscriber when RUST_LOG is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "docker_ready=debug",
            _ => "docker_ready=trace",
        }
    }
}
