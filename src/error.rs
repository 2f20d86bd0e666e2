//! Error types for docker-ready.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a readiness wait.
///
/// Transient failures (connection refused, no matching line yet, a status
/// outside the accepted range) never show up here; the wait loop absorbs them.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The condition was not satisfied before its deadline.
    #[error("Timeout on waiting for {description} ({condition}) after {timeout:?}")]
    Timeout {
        /// Description of the waiting container.
        description: String,
        /// Description of the condition that was not satisfied.
        condition: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The condition can never be satisfied as configured.
    #[error("Wait condition misconfigured: {reason}")]
    Configuration {
        /// Reason for error.
        reason: String,
    },
}

impl WaitError {
    /// Returns true if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Errors from the container runtime while reading logs.
#[derive(Debug, Error)]
pub enum LogError {
    /// Docker is not available.
    #[error("Docker not available: {reason}")]
    DockerNotAvailable {
        /// Reason why Docker is unavailable.
        reason: String,
    },

    /// Attaching to the live log stream failed.
    #[error("Failed to attach to logs of '{container}': {reason}")]
    Attach {
        /// Container id.
        container: String,
        /// Reason for failure.
        reason: String,
    },

    /// Fetching the current log failed.
    #[error("Failed to fetch log of '{container}': {reason}")]
    Fetch {
        /// Container id.
        container: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_container_and_condition() {
        let err = WaitError::Timeout {
            description: "'db' 0123456789ab postgres:16".to_string(),
            condition: "log message 'ready'".to_string(),
            timeout: Duration::from_secs(5),
        };

        let msg = err.to_string();
        assert!(msg.contains("'db' 0123456789ab postgres:16"));
        assert!(msg.contains("log message 'ready'"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_errors_convert_into_crate_error() {
        let err: Error = WaitError::Configuration {
            reason: "bad method".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Wait(WaitError::Configuration { .. })));

        let err: Error = LogError::DockerNotAvailable {
            reason: "no socket".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Docker not available: no socket");
    }
}
