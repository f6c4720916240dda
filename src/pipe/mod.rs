//! In-memory segmented pipe with its own flow control.
//!
//! The writer fills memory segments it gets from [`PipeWriter::get_memory`]
//! and publishes them with [`PipeWriter::flush`]. The reader sees every
//! published, unconsumed segment as one [`ReadBuffer`] and releases bytes with
//! [`PipeReader::advance`].
//!
//! Backpressure is byte-based: once the unconsumed byte count reaches the
//! pause threshold, `flush` waits until the reader has drained it down to the
//! resume threshold (or has completed).
//!
//! ```
//! use pipecopy::pipe::{pipe, PipeOptions};
//!
//! # tokio_test::block_on(async {
//! let (mut writer, mut reader) = pipe(PipeOptions::default());
//!
//! let memory = writer.get_memory(5);
//! memory[..5].copy_from_slice(b"hello");
//! writer.advance(5);
//! assert!(!writer.flush().await.is_completed);
//! writer.complete();
//!
//! let result = reader.read().await;
//! assert!(result.is_completed);
//! assert_eq!(result.buffer.to_vec(), b"hello");
//! reader.advance(result.buffer.len());
//! # });
//! ```

mod reader;
mod writer;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::task::AtomicWaker;
use parking_lot::Mutex;

use crate::config::{
    CopyConfig, DEFAULT_PAUSE_THRESHOLD, DEFAULT_RESUME_THRESHOLD, DEFAULT_SEGMENT_SIZE,
};

pub use reader::{PipeReader, ReadBuffer, ReadResult};
pub use writer::{FlushResult, PipeWriter};

/// Sizing and flow-control settings for a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOptions {
    /// Minimum size of a freshly allocated segment.
    pub segment_size: usize,
    /// Unconsumed bytes at which the writer pauses.
    pub pause_threshold: usize,
    /// Unconsumed bytes at which a paused writer resumes.
    pub resume_threshold: usize,
}

impl PipeOptions {
    /// Takes the pipe settings out of a copy configuration.
    pub fn from_config(config: &CopyConfig) -> Self {
        Self {
            segment_size: config.segment_size(),
            pause_threshold: config.pause_threshold(),
            resume_threshold: config.resume_threshold(),
        }
    }
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            pause_threshold: DEFAULT_PAUSE_THRESHOLD,
            resume_threshold: DEFAULT_RESUME_THRESHOLD,
        }
    }
}

/// Memory counters of a pipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Segments allocated by the writer.
    pub segments_allocated: usize,
    /// Bytes allocated for those segments.
    pub bytes_allocated: usize,
    /// Highest number of published, unconsumed segments.
    pub peak_segments: usize,
    /// Highest number of published, unconsumed bytes.
    pub peak_buffered: usize,
}

/// Creates a connected writer/reader pair.
pub fn pipe(options: PipeOptions) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState::default()),
        reader_waker: AtomicWaker::new(),
        writer_waker: AtomicWaker::new(),
    });
    (
        PipeWriter::new(shared.clone(), options),
        PipeReader::new(shared),
    )
}

struct Shared {
    state: Mutex<PipeState>,
    reader_waker: AtomicWaker,
    writer_waker: AtomicWaker,
}

#[derive(Default)]
struct PipeState {
    segments: VecDeque<Bytes>,
    buffered: usize,
    writer_paused: bool,
    writer_completed: bool,
    reader_completed: bool,
    stats: PipeStats,
}

impl PipeState {
    fn publish(&mut self, segment: Bytes) {
        self.buffered += segment.len();
        self.segments.push_back(segment);
        self.stats.peak_segments = self.stats.peak_segments.max(self.segments.len());
        self.stats.peak_buffered = self.stats.peak_buffered.max(self.buffered);
    }
}
