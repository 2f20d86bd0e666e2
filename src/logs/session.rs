//! Attachment to a running container's output.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinSet;

use crate::logs::printer::LinePrinter;
use crate::logs::sink::LogSink;
use crate::logs::splitter::{DEFAULT_QUEUE_CAPACITY, SplitterInput, StreamSplitter};
use crate::runtime::{ContainerRuntime, LogOptions, short_id};
use crate::wait::listener::{LineListener, ListenerFanout};

/// Default time `close` waits for the log tasks to finish.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Streams one container's output into a splitter and drains it.
///
/// Up to four tasks run per session: the feed task reading the runtime's
/// stream, a listener printer on the combined output, and one printer each
/// for stdout and stderr when a sink is configured.
pub struct LogSession {
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    listeners: Option<ListenerFanout>,
    stdout_sink: Option<LogSink>,
    stderr_sink: Option<LogSink>,
    queue_capacity: usize,
    shutdown_grace: Duration,
    splitter: Option<StreamSplitter>,
    tasks: JoinSet<()>,
    started: bool,
    closed: bool,
}

impl LogSession {
    /// A session without listeners or sinks.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container_id: impl Into<String>) -> Self {
        Self {
            runtime,
            container_id: container_id.into(),
            listeners: None,
            stdout_sink: None,
            stderr_sink: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            splitter: None,
            tasks: JoinSet::new(),
            started: false,
            closed: false,
        }
    }

    /// Deliver every combined line to these listeners.
    pub fn with_listeners(mut self, listeners: ListenerFanout) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn with_stdout_sink(mut self, sink: Option<LogSink>) -> Self {
        self.stdout_sink = sink;
        self
    }

    pub fn with_stderr_sink(mut self, sink: Option<LogSink>) -> Self {
        self.stderr_sink = sink;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Attach to the container's live output. Calling it again does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let short = short_id(&self.container_id).to_string();
        let mut splitter = StreamSplitter::new(self.queue_capacity);

        if let (Some(listeners), Some(reader)) = (
            self.listeners.take().filter(|l| !l.is_empty()),
            splitter.take_combined(),
        ) {
            let listener: Arc<dyn LineListener> = Arc::new(listeners);
            self.tasks.spawn(async move {
                LinePrinter::new("", reader)
                    .with_listener(listener)
                    .run()
                    .await;
            });
        }

        if let (Some(sink), Some(reader)) = (self.stdout_sink.take(), splitter.take_stdout()) {
            let prefix = format!("{short}-stdout> ");
            self.tasks.spawn(async move {
                LinePrinter::new(prefix, reader).with_sink(sink).run().await;
            });
        }

        if let (Some(sink), Some(reader)) = (self.stderr_sink.take(), splitter.take_stderr()) {
            let prefix = format!("{short}-stderr> ");
            self.tasks.spawn(async move {
                LinePrinter::new(prefix, reader).with_sink(sink).run().await;
            });
        }

        // Outputs nobody reads are dropped here, so the splitter skips them.
        drop(splitter.take_combined());
        drop(splitter.take_stdout());
        drop(splitter.take_stderr());

        if let Some(input) = splitter.take_input() {
            let runtime = Arc::clone(&self.runtime);
            let container_id = self.container_id.clone();
            self.tasks.spawn(feed(runtime, container_id, input));
        }

        self.splitter = Some(splitter);
        tracing::debug!("{} log session started ({} tasks)", short, self.tasks.len());
    }

    /// Stop following the log and give the tasks a grace period to finish.
    ///
    /// Never fails. Tasks still running after the grace period are aborted.
    /// Calling it again does nothing.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let short = short_id(&self.container_id).to_string();
        if let Some(splitter) = self.splitter.as_ref() {
            splitter.close();
        }

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result
                    && e.is_panic()
                {
                    tracing::warn!("{} log task panicked: {}", short, e);
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "{} {} log task(s) still running after {:?}, abandoning them",
                short,
                self.tasks.len(),
                self.shutdown_grace
            );
            self.tasks.abort_all();
        }

        tracing::debug!("{} log session closed", short);
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if self.started && !self.closed {
            if let Some(splitter) = self.splitter.as_ref() {
                splitter.close();
            }
            tracing::debug!(
                "{} log session dropped without close(), aborting tasks",
                short_id(&self.container_id)
            );
        }
    }
}

/// Copy the runtime's stream into the splitter until either side ends.
async fn feed(runtime: Arc<dyn ContainerRuntime>, container_id: String, mut input: SplitterInput) {
    let short = short_id(&container_id).to_string();
    tracing::trace!("{} attaching to logs", short);

    let attached = tokio::select! {
        biased;
        _ = input.closed() => None,
        stream = runtime.attach_logs(&container_id, LogOptions::follow()) => Some(stream),
    };

    match attached {
        None => {}
        Some(Err(e)) => tracing::warn!("{} could not attach to logs: {}", short, e),
        Some(Ok(mut stream)) => loop {
            let item = tokio::select! {
                biased;
                _ = input.closed() => break,
                item = stream.next() => item,
            };
            match item {
                Some(Ok(chunk)) => {
                    if input.write(chunk).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("{} log stream failed: {}", short, e);
                    break;
                }
                None => break,
            }
        },
    }

    input.close();
    tracing::trace!("{} detached from logs", short);
}
