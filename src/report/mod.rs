//! Outcome of a finished copy session.

use std::fmt;
use std::time::Duration;

use crate::engine::Strategy;

/// Timing and memory figures for one copy.
///
/// `buffers_allocated` and `bytes_allocated` count the engine's own transfer
/// memory: pooled buffers for the queue engine, pipe segments for the pipe
/// engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Engine that performed the copy.
    pub strategy: Strategy,
    /// Wall-clock time from start to both sides finishing.
    pub elapsed: Duration,
    /// Bytes written to the destination.
    pub bytes_copied: u64,
    /// Chunks or segments written to the destination.
    pub chunks_written: u64,
    /// Transfer buffers allocated.
    pub buffers_allocated: usize,
    /// Bytes of transfer buffers allocated.
    pub bytes_allocated: usize,
    /// Highest number of transfer buffers alive at once.
    pub peak_resident_buffers: usize,
    /// Highest queue depth (pooled engine) or number of unconsumed segments
    /// (pipe engines).
    pub peak_queued_chunks: usize,
}

impl CopyReport {
    /// Bytes per second over the whole session.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_copied as f64 / secs
    }
}

impl fmt::Display for CopyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: copied {} bytes in {:.3?} ({} writes, {:.1} MiB/s); allocated {} buffers / {} bytes, peak {} resident, peak queue {}",
            self.strategy,
            self.bytes_copied,
            self.elapsed,
            self.chunks_written,
            self.throughput() / (1024.0 * 1024.0),
            self.buffers_allocated,
            self.bytes_allocated,
            self.peak_resident_buffers,
            self.peak_queued_chunks
        )
    }
}
