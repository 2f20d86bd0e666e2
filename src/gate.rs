//! Startup gate for one container.
//!
//! A gate owns the log session of a container that something else has
//! already started, and blocks until every configured wait condition holds.
//! Listener conditions are registered with the fan-out before the log stream
//! is attached, so no line printed during boot is missed.

use std::sync::Arc;
use std::time::Duration;

use crate::config::FixtureConfig;
use crate::error::{LogError, WaitError};
use crate::logs::session::LogSession;
use crate::logs::sink::LogSink;
use crate::runtime::{ContainerRuntime, LogOptions, short_id};
use crate::wait::condition::{Condition, StartCondition};
use crate::wait::engine::WaitEngine;
use crate::wait::listener::ListenerFanout;
use crate::wait::log_match::FullLogMessage;
use crate::wait::wait_for::WaitFor;

/// Waits for a running container to become ready and keeps its output
/// flowing to the configured sinks afterwards.
pub struct StartupGate {
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    name: Option<String>,
    image: Option<String>,
    config: FixtureConfig,
    wait_for: Vec<WaitFor>,
    stdout_sink: Option<LogSink>,
    stderr_sink: Option<LogSink>,
    console: bool,
    session: Option<LogSession>,
}

impl StartupGate {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container_id: impl Into<String>) -> Self {
        Self {
            runtime,
            container_id: container_id.into(),
            name: None,
            image: None,
            config: FixtureConfig::default(),
            wait_for: Vec::new(),
            stdout_sink: None,
            stderr_sink: None,
            console: true,
            session: None,
        }
    }

    /// Service name, used in descriptions.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Image reference, used in descriptions.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Timeouts, buffer sizes and the conditions listed in the config.
    pub fn with_config(mut self, config: FixtureConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a condition, checked after the ones from the config.
    pub fn wait_for(mut self, wait_for: WaitFor) -> Self {
        self.wait_for.push(wait_for);
        self
    }

    /// Write stdout lines here instead of the console.
    pub fn with_stdout_sink(mut self, sink: LogSink) -> Self {
        self.stdout_sink = Some(sink);
        self
    }

    /// Write stderr lines here instead of the console.
    pub fn with_stderr_sink(mut self, sink: LogSink) -> Self {
        self.stderr_sink = Some(sink);
        self
    }

    /// Never fall back to console sinks, whatever `print_logs` says.
    pub fn no_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// True once `start` has succeeded and until `close`.
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// `'<name>' <short-id> <image>`, leaving out what is not known.
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(name) = &self.name {
            parts.push(format!("'{name}'"));
        }
        parts.push(short_id(&self.container_id).to_string());
        if let Some(image) = &self.image {
            parts.push(image.clone());
        }
        parts.join(" ")
    }

    fn engine(&self) -> WaitEngine {
        WaitEngine::new().with_poll_interval(self.config.poll_interval)
    }

    /// Attach to the container's output and wait until every condition holds.
    ///
    /// Conditions are checked one after another, each with the full
    /// configured timeout. On failure the log session is closed before the
    /// error is returned. Calling it again after a success does nothing.
    pub async fn start(&mut self) -> Result<(), WaitError> {
        if self.session.is_some() {
            return Ok(());
        }

        let conditions = self
            .config
            .wait_for
            .iter()
            .chain(self.wait_for.iter())
            .map(|w| w.build(&self.runtime, &self.container_id))
            .collect::<Result<Vec<StartCondition>, _>>()?;

        let mut listeners = ListenerFanout::builder();
        for listener in conditions.iter().filter_map(StartCondition::line_listener) {
            listeners.add(listener);
        }

        let console = self.console && self.config.print_logs;
        let stdout_sink = self
            .stdout_sink
            .take()
            .or_else(|| console.then(LogSink::stdout));
        let stderr_sink = self
            .stderr_sink
            .take()
            .or_else(|| console.then(LogSink::stderr));

        let mut session = LogSession::new(Arc::clone(&self.runtime), self.container_id.clone())
            .with_listeners(listeners.build())
            .with_stdout_sink(stdout_sink)
            .with_stderr_sink(stderr_sink)
            .with_queue_capacity(self.config.log_buffer)
            .with_shutdown_grace(self.config.shutdown_grace);
        session.start();

        let description = self.describe();
        tracing::debug!(
            "Waiting for {} ({} condition(s))",
            description,
            conditions.len()
        );

        if let Err(e) = self
            .engine()
            .run_all(&conditions, self.config.wait_timeout, &description)
            .await
        {
            session.close().await;
            return Err(e);
        }

        self.session = Some(session);
        tracing::info!("Container {} is ready", description);
        Ok(())
    }

    /// Wait for `message` to show up anywhere in the current log.
    ///
    /// Works at any time, including long after `start`, since the full log
    /// is fetched on every poll.
    pub async fn wait_for_log_message(
        &self,
        message: &str,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let condition = FullLogMessage::new(
            Arc::clone(&self.runtime),
            self.container_id.clone(),
            message,
        );
        tracing::debug!(
            "Waiting for {} on {}",
            condition.describe(),
            self.describe()
        );
        self.engine()
            .run(&condition, timeout, &self.describe())
            .await
    }

    /// Everything the container has written so far, stdout and stderr.
    pub async fn log(&self) -> Result<String, LogError> {
        self.runtime
            .current_log(&self.container_id, LogOptions::snapshot())
            .await
    }

    /// Detach from the container's output.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl std::fmt::Debug for StartupGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupGate")
            .field("container", &self.describe())
            .field("wait_for", &self.wait_for)
            .field("started", &self.is_started())
            .finish()
    }
}
