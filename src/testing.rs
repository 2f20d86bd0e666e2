//! In-memory runtime for exercising the log pipeline without a daemon.
//!
//! Provides:
//! - [`ScriptedRuntime`]: a [`ContainerRuntime`] that replays or streams
//!   scripted output and remembers everything it produced
//! - [`ScriptedLog`]: the handle that feeds a live script
//!
//! # Usage
//!
//! ```rust,no_run
//! use docker_ready::runtime::LogChunk;
//! use docker_ready::testing::ScriptedRuntime;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (runtime, log) = ScriptedRuntime::live();
//!     log.push(LogChunk::stdout("listening on :8080\n"));
//!     log.finish();
//!     // hand `runtime` to a LogSession or StartupGate
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::LogError;
use crate::runtime::{ContainerRuntime, LogChunk, LogOptions, LogSource, LogStream};

enum Script {
    Replay(Vec<LogChunk>),
    Live(Option<mpsc::UnboundedReceiver<LogChunk>>),
    Fail(String),
}

type Recorded = Arc<Mutex<Vec<LogChunk>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scripted [`ContainerRuntime`].
///
/// Replay scripts can be attached any number of times. A live script hands
/// out its stream once; later attaches fail with [`LogError::Attach`].
pub struct ScriptedRuntime {
    script: Mutex<Script>,
    recorded: Recorded,
}

impl ScriptedRuntime {
    /// Emits `chunks` and then ends the stream.
    pub fn replay(chunks: Vec<LogChunk>) -> Self {
        Self {
            recorded: Arc::new(Mutex::new(chunks.clone())),
            script: Mutex::new(Script::Replay(chunks)),
        }
    }

    /// Streams whatever is pushed through the returned handle, until the
    /// handle is finished or dropped.
    pub fn live() -> (Self, ScriptedLog) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorded: Recorded = Arc::default();
        let runtime = Self {
            script: Mutex::new(Script::Live(Some(rx))),
            recorded: Arc::clone(&recorded),
        };
        (runtime, ScriptedLog { tx, recorded })
    }

    /// Every attach and fetch fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(Script::Fail(reason.into())),
            recorded: Arc::default(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn attach_logs(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<LogStream, LogError> {
        let wanted = move |chunk: &LogChunk| match chunk.source {
            LogSource::Stdout => options.stdout,
            LogSource::Stderr => options.stderr,
        };

        let mut script = lock(&self.script);
        match &mut *script {
            Script::Replay(chunks) => {
                let chunks: Vec<_> = chunks.iter().filter(|c| wanted(c)).cloned().collect();
                Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            Script::Live(rx) => {
                let rx = rx.take().ok_or_else(|| LogError::Attach {
                    container: container_id.to_string(),
                    reason: "scripted stream already attached".to_string(),
                })?;
                let stream = UnboundedReceiverStream::new(rx)
                    .filter(move |c| futures::future::ready(wanted(c)))
                    .map(Ok);
                Ok(stream.boxed())
            }
            Script::Fail(reason) => Err(LogError::Attach {
                container: container_id.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    async fn current_log(
        &self,
        container_id: &str,
        options: LogOptions,
    ) -> Result<String, LogError> {
        if let Script::Fail(reason) = &*lock(&self.script) {
            return Err(LogError::Fetch {
                container: container_id.to_string(),
                reason: reason.clone(),
            });
        }

        let mut log = String::new();
        for chunk in lock(&self.recorded).iter() {
            let wanted = match chunk.source {
                LogSource::Stdout => options.stdout,
                LogSource::Stderr => options.stderr,
            };
            if wanted {
                log.push_str(&String::from_utf8_lossy(&chunk.bytes));
            }
        }
        Ok(log)
    }
}

/// Feeds a live [`ScriptedRuntime`].
pub struct ScriptedLog {
    tx: mpsc::UnboundedSender<LogChunk>,
    recorded: Recorded,
}

impl ScriptedLog {
    /// Emit a chunk. It also becomes part of the current log.
    pub fn push(&self, chunk: LogChunk) {
        lock(&self.recorded).push(chunk.clone());
        // Nobody attached any more; the chunk still counts for current_log.
        let _ = self.tx.send(chunk);
    }

    /// End the live stream, as if the container had exited.
    pub fn finish(self) {}
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn collect(mut stream: LogStream) -> Vec<LogChunk> {
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item.unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn test_replay_can_attach_twice() {
        let runtime = ScriptedRuntime::replay(vec![LogChunk::stdout("a"), LogChunk::stderr("b")]);

        let first = collect(runtime.attach_logs("c", LogOptions::follow()).await.unwrap()).await;
        let second = collect(runtime.attach_logs("c", LogOptions::follow()).await.unwrap()).await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_replay_honours_stream_selection() {
        let runtime = ScriptedRuntime::replay(vec![LogChunk::stdout("a"), LogChunk::stderr("b")]);
        let options = LogOptions {
            stdout: false,
            ..LogOptions::follow()
        };

        let chunks = collect(runtime.attach_logs("c", options).await.unwrap()).await;
        assert_eq!(chunks, vec![LogChunk::stderr("b")]);
        assert_eq!(runtime.current_log("c", options).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_live_stream_records_and_ends() {
        let (runtime, log) = ScriptedRuntime::live();
        let stream = runtime.attach_logs("c", LogOptions::follow()).await.unwrap();

        log.push(LogChunk::stdout("one\n"));
        log.push(LogChunk::stderr("two\n"));
        log.finish();

        assert_eq!(collect(stream).await.len(), 2);
        assert_eq!(
            runtime.current_log("c", LogOptions::snapshot()).await.unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_live_stream_attaches_once() {
        let (runtime, _log) = ScriptedRuntime::live();
        let _stream = runtime.attach_logs("c", LogOptions::follow()).await.unwrap();

        let err = runtime
            .attach_logs("c", LogOptions::follow())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LogError::Attach { .. }));
    }

    #[tokio::test]
    async fn test_failing_runtime() {
        let runtime = ScriptedRuntime::failing("gone");
        assert!(matches!(
            runtime.attach_logs("c", LogOptions::follow()).await,
            Err(LogError::Attach { .. })
        ));
        assert!(matches!(
            runtime.current_log("c", LogOptions::snapshot()).await,
            Err(LogError::Fetch { .. })
        ));
    }
}
