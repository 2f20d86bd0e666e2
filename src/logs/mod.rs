//! Live container output capture.
//!
//! ```text
//!   runtime log stream ──▶ feed task ──▶ StreamSplitter
//!                                          │  │  │
//!                   ┌──────────────────────┘  │  └───────────────────┐
//!                   ▼                         ▼                      ▼
//!             combined printer          stdout printer         stderr printer
//!             (listener fan-out)        (stdout sink)          (stderr sink)
//! ```
//!
//! Each output queue is bounded and the splitter waits for slow readers
//! rather than dropping output. A sink that blocks for a long time (a full
//! pipe, a stuck file system) will therefore eventually stall the whole
//! session, including log-based wait conditions. Keep sinks fast, or leave
//! them out if output is not needed.
//!
//! The combined output is the raw bytes of both streams in arrival order and
//! lines are assembled after merging. A stdout line that is still unfinished
//! when a stderr chunk arrives is therefore joined with that chunk on the
//! combined output, and listeners see the merged text. The stdout and stderr
//! printers assemble lines per stream and are not affected.

pub mod printer;
pub mod session;
pub mod sink;
pub mod splitter;

pub use printer::LinePrinter;
pub use session::LogSession;
pub use sink::{CapturedLog, LogSink};
pub use splitter::{DEFAULT_QUEUE_CAPACITY, LogReader, SplitterClosed, SplitterInput, StreamSplitter};
