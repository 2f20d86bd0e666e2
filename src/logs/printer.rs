//! Drains one splitter output line by line.

use std::sync::Arc;

use crate::logs::sink::LogSink;
use crate::logs::splitter::LogReader;
use crate::wait::listener::LineListener;

/// Reads lines from a [`LogReader`] and hands each one to a sink, a
/// listener, or both.
///
/// The sink receives `prefix + line`; the listener receives the bare line.
pub struct LinePrinter {
    prefix: String,
    reader: LogReader,
    sink: Option<LogSink>,
    listener: Option<Arc<dyn LineListener>>,
}

impl LinePrinter {
    pub fn new(prefix: impl Into<String>, reader: LogReader) -> Self {
        Self {
            prefix: prefix.into(),
            reader,
            sink: None,
            listener: None,
        }
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LineListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Run until the reader reaches end of stream. Returns the number of
    /// lines read.
    ///
    /// A failing sink is reported once and then left alone; the listener
    /// keeps receiving lines.
    pub async fn run(mut self) -> usize {
        let mut count = 0;

        while let Some(line) = self.reader.next_line().await {
            count += 1;

            if let Some(sink) = self.sink.as_mut()
                && let Err(e) = sink.write_line(&self.prefix, &line)
            {
                tracing::warn!(
                    "Failed to write log line to {}, disabling sink: {}",
                    sink.name(),
                    e
                );
                self.sink = None;
            }

            if let Some(listener) = self.listener.as_ref() {
                listener.on_line(&line);
            }
        }

        tracing::trace!("Printer '{}' reached end of stream", self.prefix.trim());
        count
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::logs::splitter::StreamSplitter;
    use crate::runtime::LogChunk;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl LineListener for Recorder {
        fn on_line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    struct BrokenWriter;

    impl io::Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prints_prefixed_and_notifies_bare() {
        let mut splitter = StreamSplitter::new(8);
        let mut input = splitter.take_input().unwrap();
        let reader = splitter.take_stdout().unwrap();

        let (sink, captured) = LogSink::capture();
        let recorder = Arc::new(Recorder::default());
        let printer = LinePrinter::new("0123456789ab-stdout> ", reader)
            .with_sink(sink)
            .with_listener(recorder.clone());

        input.write(LogChunk::stdout("one\ntwo\n")).await.unwrap();
        drop(input);

        assert_eq!(printer.run().await, 2);
        assert_eq!(
            captured.lines(),
            vec!["0123456789ab-stdout> one", "0123456789ab-stdout> two"]
        );
        assert_eq!(*recorder.0.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_runs_without_destinations() {
        let mut splitter = StreamSplitter::new(8);
        let mut input = splitter.take_input().unwrap();
        let reader = splitter.take_stderr().unwrap();

        input.write(LogChunk::stderr("x\n")).await.unwrap();
        splitter.close();

        assert_eq!(LinePrinter::new("", reader).run().await, 1);
    }

    #[tokio::test]
    async fn test_broken_sink_does_not_stop_listener() {
        let mut splitter = StreamSplitter::new(8);
        let mut input = splitter.take_input().unwrap();
        let reader = splitter.take_combined().unwrap();

        let recorder = Arc::new(Recorder::default());
        let printer = LinePrinter::new("", reader)
            .with_sink(LogSink::new("broken", BrokenWriter))
            .with_listener(recorder.clone());

        input.write(LogChunk::stdout("a\nb\n")).await.unwrap();
        drop(input);

        assert_eq!(printer.run().await, 2);
        assert_eq!(*recorder.0.lock().unwrap(), vec!["a", "b"]);
    }
}
