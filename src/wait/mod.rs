//! Readiness conditions and the engine that waits on them.
//!
//! # Condition kinds
//!
//! | Kind | Learns about readiness by | Examples |
//! |------|---------------------------|----------|
//! | Pollable | doing I/O on every check | [`HttpPing`], [`FullLogMessage`] |
//! | Listener | log line notifications | [`LogMessage`], [`LogMessageSequence`] |
//!
//! Listener conditions have to be registered with the log fan-out before
//! the log stream is attached, otherwise lines printed while the container
//! boots are lost. [`crate::gate::StartupGate`] takes care of that ordering.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use docker_ready::wait::{HttpPing, StartCondition, WaitEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ping = StartCondition::pollable(HttpPing::new("http://127.0.0.1:8080/health")?);
//! WaitEngine::new()
//!     .run(&ping, Duration::from_secs(30), "web")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod condition;
pub mod engine;
pub mod http_ping;
pub mod listener;
pub mod log_match;
pub mod wait_for;

pub use condition::{Condition, ListenerCondition, StartCondition};
pub use engine::{DEFAULT_POLL_INTERVAL, WaitEngine};
pub use http_ping::{HttpPing, StatusRange};
pub use listener::{LineListener, ListenerFanout, ListenerFanoutBuilder};
pub use log_match::{FullLogMessage, LogMessage, LogMessageSequence};
pub use wait_for::WaitFor;
