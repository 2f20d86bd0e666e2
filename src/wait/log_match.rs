//! Conditions that look for text in container output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::WaitError;
use crate::runtime::{ContainerRuntime, LogOptions, short_id};
use crate::wait::condition::Condition;
use crate::wait::listener::LineListener;

/// Satisfied once any line contains the given text. Never resets.
#[derive(Debug)]
pub struct LogMessage {
    message: String,
    matched: AtomicBool,
}

impl LogMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            matched: AtomicBool::new(false),
        }
    }
}

impl LineListener for LogMessage {
    fn on_line(&self, line: &str) {
        if !self.matched.load(Ordering::Acquire) && line.contains(&self.message) {
            tracing::debug!("Found log message '{}'", self.message);
            self.matched.store(true, Ordering::Release);
        }
    }
}

#[async_trait]
impl Condition for LogMessage {
    async fn check(&self) -> Result<bool, WaitError> {
        Ok(self.matched.load(Ordering::Acquire))
    }

    fn describe(&self) -> String {
        format!("log message '{}'", self.message)
    }
}

/// Satisfied once the messages have appeared in order, each on a later line
/// than the previous one.
///
/// Only the next expected message is looked for; a later message showing up
/// early does not count.
#[derive(Debug)]
pub struct LogMessageSequence {
    messages: Vec<String>,
    next: AtomicUsize,
}

impl LogMessageSequence {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// How many messages have been seen so far.
    pub fn matched(&self) -> usize {
        self.next.load(Ordering::Acquire)
    }
}

impl LineListener for LogMessageSequence {
    fn on_line(&self, line: &str) {
        // Lines arrive from a single printer task, so load-then-store is enough.
        let next = self.next.load(Ordering::Acquire);
        if let Some(expected) = self.messages.get(next)
            && line.contains(expected.as_str())
        {
            tracing::debug!(
                "Found log message '{}' ({} of {})",
                expected,
                next + 1,
                self.messages.len()
            );
            self.next.store(next + 1, Ordering::Release);
        }
    }
}

#[async_trait]
impl Condition for LogMessageSequence {
    async fn check(&self) -> Result<bool, WaitError> {
        Ok(self.matched() == self.messages.len())
    }

    fn describe(&self) -> String {
        let quoted: Vec<String> = self.messages.iter().map(|m| format!("'{m}'")).collect();
        format!(
            "log message sequence [{}] ({} of {} seen)",
            quoted.join(", "),
            self.matched(),
            self.messages.len()
        )
    }
}

/// Polls the complete current log for the given text.
///
/// Unlike [`LogMessage`] this needs no registration before attaching, so it
/// works for ad-hoc waits on a container that is already running.
pub struct FullLogMessage {
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    message: String,
}

impl FullLogMessage {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            container_id: container_id.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Condition for FullLogMessage {
    async fn check(&self) -> Result<bool, WaitError> {
        match self
            .runtime
            .current_log(&self.container_id, LogOptions::snapshot())
            .await
        {
            Ok(log) => Ok(log.contains(&self.message)),
            Err(e) => {
                tracing::trace!(
                    "{} log fetch failed, will retry: {}",
                    short_id(&self.container_id),
                    e
                );
                Ok(false)
            }
        }
    }

    fn describe(&self) -> String {
        format!("full log message '{}'", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LogChunk;
    use crate::testing::ScriptedRuntime;

    fn check(condition: &dyn Condition) -> bool {
        tokio_test::block_on(condition.check()).unwrap()
    }

    #[test]
    fn test_log_message_latches() {
        let condition = LogMessage::new("started");
        assert!(!check(&condition));

        condition.on_line("booting");
        assert!(!check(&condition));

        condition.on_line("server started on :8080");
        assert!(check(&condition));

        condition.on_line("shutting down");
        condition.on_line("");
        assert!(check(&condition));
    }

    #[test]
    fn test_sequence_requires_order() {
        let condition = LogMessageSequence::new(["A", "B"]);
        condition.on_line("B");
        condition.on_line("A");
        assert!(!check(&condition));
        assert_eq!(condition.matched(), 1);

        let condition = LogMessageSequence::new(["A", "B"]);
        condition.on_line("A");
        assert!(!check(&condition));
        condition.on_line("B");
        assert!(check(&condition));
    }

    #[test]
    fn test_sequence_counts_repeated_message_per_line() {
        let condition = LogMessageSequence::new(["TICK", "TICK"]);
        for line in ["01", "TICK", "02", "03"] {
            condition.on_line(line);
        }
        assert!(!check(&condition));

        condition.on_line("TICK");
        assert!(check(&condition));

        condition.on_line("unrelated");
        assert!(check(&condition));
    }

    #[test]
    fn test_empty_sequence_is_satisfied() {
        let condition = LogMessageSequence::new(Vec::<String>::new());
        assert!(check(&condition));
    }

    #[tokio::test]
    async fn test_full_log_message_polls_current_log() {
        let runtime = Arc::new(ScriptedRuntime::replay(vec![
            LogChunk::stdout("booting\n"),
            LogChunk::stderr("listening on 5432\n"),
        ]));
        let found = FullLogMessage::new(runtime.clone(), "c1", "listening on");
        assert!(found.check().await.unwrap());

        let missing = FullLogMessage::new(runtime, "c1", "never");
        assert!(!missing.check().await.unwrap());
        assert_eq!(missing.describe(), "full log message 'never'");
    }

    #[tokio::test]
    async fn test_full_log_fetch_failure_is_not_ready() {
        let runtime = Arc::new(ScriptedRuntime::failing("no such container"));
        let condition = FullLogMessage::new(runtime, "gone", "anything");
        assert!(!condition.check().await.unwrap());
    }

    #[test]
    fn test_describe() {
        assert_eq!(LogMessage::new("ok").describe(), "log message 'ok'");

        let seq = LogMessageSequence::new(["a", "b"]);
        seq.on_line("a");
        assert_eq!(
            seq.describe(),
            "log message sequence ['a', 'b'] (1 of 2 seen)"
        );
    }
}
