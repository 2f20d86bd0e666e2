//! Demultiplexes one tagged output stream into stdout, stderr and combined.
//!
//! Each output is a bounded queue. When a reader falls behind, the writer
//! waits for room instead of dropping output, so a stalled reader also stalls
//! whoever feeds the input. Dropping a reader is the way to opt out: its
//! queue is then skipped and never blocks the writer again.
//!
//! Closing is signalled out of band, so it works from any task and wakes
//! both a writer blocked on a full queue and readers blocked on an empty one.
//! Readers still receive chunks that were queued before the close.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::runtime::{LogChunk, LogSource};

/// Default number of chunks each output queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Returned when writing to a splitter that has been closed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("log splitter closed")]
pub struct SplitterClosed;

#[derive(Clone)]
struct CloseSignal(Arc<watch::Sender<bool>>);

impl CloseSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self(Arc::new(tx))
    }

    /// Returns false if the signal was already raised.
    fn raise(&self) -> bool {
        self.0.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    fn is_raised(&self) -> bool {
        *self.0.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// Resolves once the splitter is closed or every handle to it is gone.
async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Splits tagged chunks into three independently readable outputs.
///
/// The endpoints are handed out once each through the `take_*` methods.
pub struct StreamSplitter {
    input: Option<SplitterInput>,
    stdout: Option<LogReader>,
    stderr: Option<LogReader>,
    combined: Option<LogReader>,
    signal: CloseSignal,
}

impl StreamSplitter {
    /// Create a splitter whose output queues hold `capacity` chunks each.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let signal = CloseSignal::new();

        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);
        let (combined_tx, combined_rx) = mpsc::channel(capacity);

        let input = SplitterInput {
            stdout: Some(stdout_tx),
            stderr: Some(stderr_tx),
            combined: Some(combined_tx),
            closed: signal.subscribe(),
            signal: signal.clone(),
        };

        Self {
            input: Some(input),
            stdout: Some(LogReader::new(stdout_rx, signal.subscribe())),
            stderr: Some(LogReader::new(stderr_rx, signal.subscribe())),
            combined: Some(LogReader::new(combined_rx, signal.subscribe())),
            signal,
        }
    }

    /// The writable endpoint.
    pub fn take_input(&mut self) -> Option<SplitterInput> {
        self.input.take()
    }

    /// Readable endpoint carrying stdout chunks only.
    pub fn take_stdout(&mut self) -> Option<LogReader> {
        self.stdout.take()
    }

    /// Readable endpoint carrying stderr chunks only.
    pub fn take_stderr(&mut self) -> Option<LogReader> {
        self.stderr.take()
    }

    /// Readable endpoint carrying every chunk in arrival order.
    pub fn take_combined(&mut self) -> Option<LogReader> {
        self.combined.take()
    }

    /// Close the input and end all three outputs. Safe to call repeatedly.
    pub fn close(&self) {
        if self.signal.raise() {
            tracing::trace!("Log splitter closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_raised()
    }
}

impl Default for StreamSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Writable side of a [`StreamSplitter`].
pub struct SplitterInput {
    stdout: Option<mpsc::Sender<Bytes>>,
    stderr: Option<mpsc::Sender<Bytes>>,
    combined: Option<mpsc::Sender<Bytes>>,
    closed: watch::Receiver<bool>,
    signal: CloseSignal,
}

impl SplitterInput {
    /// Copy a chunk to the combined output and to the output of its source.
    ///
    /// Waits while a live reader's queue is full.
    pub async fn write(&mut self, chunk: LogChunk) -> Result<(), SplitterClosed> {
        if self.signal.is_raised() {
            return Err(SplitterClosed);
        }

        forward(&mut self.combined, chunk.bytes.clone(), &mut self.closed).await?;
        let tagged = match chunk.source {
            LogSource::Stdout => &mut self.stdout,
            LogSource::Stderr => &mut self.stderr,
        };
        forward(tagged, chunk.bytes, &mut self.closed).await
    }

    /// Resolves once the splitter is closed from anywhere.
    pub async fn closed(&mut self) {
        wait_closed(&mut self.closed).await
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_raised()
    }

    /// Close the splitter. Safe to call repeatedly.
    pub fn close(&self) {
        if self.signal.raise() {
            tracing::trace!("Log splitter closed by writer");
        }
    }
}

async fn forward(
    output: &mut Option<mpsc::Sender<Bytes>>,
    bytes: Bytes,
    closed: &mut watch::Receiver<bool>,
) -> Result<(), SplitterClosed> {
    let delivered = {
        let Some(sender) = output.as_ref() else {
            return Ok(());
        };
        tokio::select! {
            biased;
            _ = wait_closed(closed) => None,
            sent = sender.send(bytes) => Some(sent.is_ok()),
        }
    };

    match delivered {
        None => Err(SplitterClosed),
        Some(true) => Ok(()),
        Some(false) => {
            // Reader dropped; stop copying to it.
            *output = None;
            Ok(())
        }
    }
}

/// Readable side of one splitter output.
pub struct LogReader {
    rx: mpsc::Receiver<Bytes>,
    closed: watch::Receiver<bool>,
    pending: BytesMut,
    eof: bool,
}

impl LogReader {
    fn new(rx: mpsc::Receiver<Bytes>, closed: watch::Receiver<bool>) -> Self {
        Self {
            rx,
            closed,
            pending: BytesMut::new(),
            eof: false,
        }
    }

    /// Next raw chunk, or `None` at end of stream.
    ///
    /// Do not mix with [`next_line`](Self::next_line): bytes buffered for a
    /// partial line are not returned here.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        if self.eof {
            return None;
        }
        let chunk = tokio::select! {
            biased;
            chunk = self.rx.recv() => chunk,
            _ = wait_closed(&mut self.closed) => self.rx.try_recv().ok(),
        };
        if chunk.is_none() {
            self.eof = true;
        }
        chunk
    }

    /// Next newline-terminated line without its terminator.
    ///
    /// A trailing `\r` is stripped. An unterminated tail is returned as a
    /// final line at end of stream.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let mut line = self.pending.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }

            if self.eof {
                if self.pending.is_empty() {
                    return None;
                }
                let rest = self.pending.split();
                return Some(String::from_utf8_lossy(&rest).into_owned());
            }

            match self.next_chunk().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }

    /// Read every remaining byte until end of stream.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut out = self.pending.split().to_vec();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk);
        }
        out
    }
}
