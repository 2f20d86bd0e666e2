//! Boundary to the process runtime that owns the container.
//!
//! The readiness machinery never creates or stops containers. It only needs
//! two capabilities from whoever does:
//!
//! - a live byte stream of the container's output, with each chunk tagged by
//!   the stream it was written to, following new output until the container
//!   exits or the stream is dropped
//! - a one-shot fetch of the whole log written so far
//!
//! [`docker::DockerRuntime`] provides both on top of bollard.

pub mod docker;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::LogError;

pub use docker::DockerRuntime;

/// Number of leading id characters used as a short container id.
pub const SHORT_ID_LEN: usize = 12;

/// Returns the short form of a container id.
pub fn short_id(container_id: &str) -> &str {
    match container_id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &container_id[..idx],
        None => container_id,
    }
}

/// The output stream a chunk was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSource {
    Stdout,
    Stderr,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged piece of container output.
///
/// Chunk boundaries are arbitrary: a chunk may hold part of a line or
/// several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub source: LogSource,
    pub bytes: Bytes,
}

impl LogChunk {
    pub fn new(source: LogSource, bytes: impl Into<Bytes>) -> Self {
        Self {
            source,
            bytes: bytes.into(),
        }
    }

    pub fn stdout(bytes: impl Into<Bytes>) -> Self {
        Self::new(LogSource::Stdout, bytes)
    }

    pub fn stderr(bytes: impl Into<Bytes>) -> Self {
        Self::new(LogSource::Stderr, bytes)
    }
}

/// Which streams to read and whether to keep following.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
}

impl LogOptions {
    /// Both streams, following new output.
    pub fn follow() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
        }
    }

    /// Both streams, up to the current end of the log.
    pub fn snapshot() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::follow()
    }
}

/// Live stream of tagged output chunks.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogChunk, LogError>> + Send>>;

/// Log access to containers managed elsewhere.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Open a live stream of the container's output.
    async fn attach_logs(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<LogStream, LogError>;

    /// Fetch the full log written so far as text.
    async fn current_log(&self, container_id: &str, options: LogOptions)
    -> Result<String, LogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id("4f66ad9a0b2e2a1ee0a9d3c91e0f0a2b8d"),
            "4f66ad9a0b2e"
        );
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }

    #[test]
    fn test_log_options() {
        assert!(LogOptions::default().follow);
        assert!(!LogOptions::snapshot().follow);
        assert!(LogOptions::snapshot().stdout && LogOptions::snapshot().stderr);
    }
}
