//! Readiness fixtures for containers started by something else.
//!
//! Attach to a running container's output, split it into stdout, stderr and
//! a combined view, feed log-based wait conditions, and block until every
//! condition holds or its timeout passes.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docker_ready::{DockerRuntime, StartupGate, WaitFor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(DockerRuntime::connect().await?);
//! let mut gate = StartupGate::new(runtime, "3f2a9c0d11e4")
//!     .with_name("db")
//!     .wait_for(WaitFor::log_message("ready to accept connections"));
//! gate.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod logs;
pub mod runtime;
pub mod testing;
pub mod wait;

pub use config::FixtureConfig;
pub use error::{ConfigError, Error, LogError, Result, WaitError};
pub use gate::StartupGate;
pub use runtime::{ContainerRuntime, DockerRuntime, LogChunk, LogSource};
pub use wait::{Condition, StartCondition, WaitEngine, WaitFor};
