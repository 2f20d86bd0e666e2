//! Destinations for printed container output.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Where prefixed log lines are written.
pub struct LogSink {
    name: String,
    writer: Box<dyn Write + Send>,
}

impl LogSink {
    /// Wrap an arbitrary writer.
    pub fn new(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Box::new(writer),
        }
    }

    /// The process's standard output.
    pub fn stdout() -> Self {
        Self::new("stdout", io::stdout())
    }

    /// The process's standard error.
    pub fn stderr() -> Self {
        Self::new("stderr", io::stderr())
    }

    /// Append to a file, creating it if needed.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(path.display().to_string(), file))
    }

    /// An in-memory sink plus a handle for reading what was written.
    pub fn capture() -> (Self, CapturedLog) {
        let captured = CapturedLog::default();
        let sink = Self::new("capture", CaptureWriter(Arc::clone(&captured.0)));
        (sink, captured)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `prefix + line` followed by a newline, then flush.
    pub fn write_line(&mut self, prefix: &str, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{prefix}{line}")?;
        self.writer.flush()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").field("name", &self.name).finish()
    }
}

/// Shared buffer filled by a [`LogSink::capture`] sink.
#[derive(Debug, Clone, Default)]
pub struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Written lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink_collects_lines() {
        let (mut sink, captured) = LogSink::capture();
        sink.write_line("abc-stdout> ", "first").unwrap();
        sink.write_line("abc-stdout> ", "second").unwrap();

        assert_eq!(
            captured.lines(),
            vec!["abc-stdout> first", "abc-stdout> second"]
        );
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.log");

        let mut sink = LogSink::file(&path).unwrap();
        sink.write_line("", "one").unwrap();
        drop(sink);

        let mut sink = LogSink::file(&path).unwrap();
        sink.write_line("", "two").unwrap();
        drop(sink);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
