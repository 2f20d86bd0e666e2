//! Fixture configuration from the environment and TOML files.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logs::splitter::DEFAULT_QUEUE_CAPACITY;
use crate::logs::session::DEFAULT_SHUTDOWN_GRACE;
use crate::wait::engine::DEFAULT_POLL_INTERVAL;
use crate::wait::wait_for::WaitFor;

/// Default timeout for each wait condition.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every container a fixture waits on.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureConfig {
    /// Timeout applied to each wait condition separately.
    pub wait_timeout: Duration,
    /// Pause between two checks of the same condition.
    pub poll_interval: Duration,
    /// Chunks buffered per splitter output before the feed waits.
    pub log_buffer: usize,
    /// How long closing a log session waits for its tasks.
    pub shutdown_grace: Duration,
    /// Whether container output is echoed to the console.
    pub print_logs: bool,
    /// Conditions to wait for, in order.
    pub wait_for: Vec<WaitFor>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_buffer: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            print_logs: true,
            wait_for: Vec::new(),
        }
    }
}

/// On-disk shape; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    wait_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    log_buffer: Option<usize>,
    shutdown_grace_ms: Option<u64>,
    print_logs: Option<bool>,
    #[serde(default)]
    wait_for: Vec<WaitFor>,
}

impl FixtureConfig {
    /// Resolve from `DOCKER_READY_*` environment variables.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_from(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn resolve_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env(lookup);

        let config = Self {
            wait_timeout: Duration::from_secs(
                env.parse("DOCKER_READY_WAIT_SECS", defaults.wait_timeout.as_secs())?,
            ),
            poll_interval: Duration::from_millis(env.parse(
                "DOCKER_READY_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            log_buffer: env.parse("DOCKER_READY_LOG_BUFFER", defaults.log_buffer)?,
            shutdown_grace: Duration::from_millis(env.parse(
                "DOCKER_READY_SHUTDOWN_GRACE_MS",
                defaults.shutdown_grace.as_millis() as u64,
            )?),
            print_logs: env
                .get("DOCKER_READY_PRINT_LOGS")
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "DOCKER_READY_PRINT_LOGS".to_string(),
                    message: format!("must be 'true' or 'false': {e}"),
                })?
                .unwrap_or(defaults.print_logs),
            wait_for: Vec::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```toml
    /// wait_secs = 30
    /// print_logs = false
    ///
    /// [[wait_for]]
    /// type = "log_message"
    /// message = "database system is ready"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = Self::default();

        let config = Self {
            wait_timeout: file
                .wait_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait_timeout),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            log_buffer: file.log_buffer.unwrap_or(defaults.log_buffer),
            shutdown_grace: file
                .shutdown_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
            print_logs: file.print_logs.unwrap_or(defaults.print_logs),
            wait_for: file.wait_for,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "log_buffer".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Unset and empty variables both count as missing.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            }),
            None => Ok(default),
        }
    }
}
