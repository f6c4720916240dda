//! The three copy engines and the orchestrator that picks one.
//!
//! Every engine runs a producer (reads the source) and a consumer (writes the
//! destination) as two futures polled concurrently, and finishes only after
//! both have reported done:
//!
//! - [`SegmentedPipeEngine`] - reads into pipe segments, flushing per read
//! - [`BulkPipeEngine`] - same pipe, filled by one bulk stream copy
//! - [`PooledQueueEngine`] - pooled buffers through a [`BoundedChannel`]
//!
//! [`BoundedChannel`]: crate::BoundedChannel
//!
//! # Example
//!
//! ```
//! use pipecopy::{copy, CopyConfig, Strategy};
//!
//! # tokio_test::block_on(async {
//! let source: &[u8] = b"some bytes worth copying";
//! let mut destination = Vec::new();
//!
//! let strategy: Strategy = "pooled".parse()?;
//! let report = copy(strategy, source, &mut destination, &CopyConfig::default()).await?;
//!
//! assert_eq!(destination, source);
//! assert_eq!(report.bytes_copied, source.len() as u64);
//! # Ok::<(), pipecopy::CopyError>(())
//! # }).unwrap();
//! ```

mod bulk;
mod pooled;
mod segmented;

use std::fmt;
use std::future::Future;
use std::io;
use std::str::FromStr;
use std::time::Instant;

use futures_io::{AsyncRead, AsyncWrite};
use futures_util::future::join;
use futures_util::io::AsyncReadExt;
use tracing::{Instrument, debug, debug_span, warn};

use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::pipe::PipeStats;
use crate::report::CopyReport;
use crate::session::{CopySession, MarkDone, Side};

pub use bulk::BulkPipeEngine;
pub use pooled::PooledQueueEngine;
pub use segmented::SegmentedPipeEngine;

/// Selects one of the three engines.
///
/// Parsing accepts exactly `segmented`, `bulk` or `pooled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Engine A: manual reads into pipe segments, flush per chunk.
    SegmentedPipe,
    /// Engine B: the pipe filled by a bulk stream-to-writer copy.
    BulkPipe,
    /// Engine C: pooled buffers through a bounded channel.
    PooledQueue,
}

impl Strategy {
    /// All strategies, in selector order.
    pub const ALL: [Strategy; 3] = [
        Strategy::SegmentedPipe,
        Strategy::BulkPipe,
        Strategy::PooledQueue,
    ];

    /// Selector name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SegmentedPipe => "segmented",
            Strategy::BulkPipe => "bulk",
            Strategy::PooledQueue => "pooled",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = CopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| CopyError::InvalidStrategy {
                name: s.to_string(),
            })
    }
}

/// A streaming copy engine.
///
/// `copy` moves every byte of `source` to `destination` in order and reports
/// how long it took and how much transfer memory it used. The destination is
/// flushed but not closed.
pub trait CopyEngine {
    /// The strategy this engine implements.
    fn strategy(&self) -> Strategy;

    /// Copies `source` to `destination`.
    fn copy<R, W>(
        &self,
        source: R,
        destination: W,
    ) -> impl Future<Output = Result<CopyReport, CopyError>>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin;
}

/// Copies `source` to `destination` with the engine `strategy` selects.
///
/// The configuration is validated first. Any fault of either side fails the
/// whole copy; bytes already written stay in the destination.
pub async fn copy<R, W>(
    strategy: Strategy,
    source: R,
    destination: W,
    config: &CopyConfig,
) -> Result<CopyReport, CopyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    config.validate()?;
    let span = debug_span!("copy", %strategy);

    let outcome = async {
        debug!(?config, "session starting");
        match strategy {
            Strategy::SegmentedPipe => {
                SegmentedPipeEngine::new(*config)
                    .copy(source, destination)
                    .await
            }
            Strategy::BulkPipe => BulkPipeEngine::new(*config).copy(source, destination).await,
            Strategy::PooledQueue => {
                PooledQueueEngine::new(*config)
                    .copy(source, destination)
                    .await
            }
        }
    }
    .instrument(span.clone())
    .await;

    let _entered = span.enter();
    match &outcome {
        Ok(report) => debug!(
            bytes = report.bytes_copied,
            elapsed = ?report.elapsed,
            "session completed"
        ),
        Err(e) => warn!(error = %e, "session failed"),
    }
    outcome
}

/// Bytes and write calls that reached the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Drained {
    pub(crate) bytes: u64,
    pub(crate) writes: u64,
}

impl Drained {
    fn record(&mut self, len: usize) {
        self.bytes += len as u64;
        self.writes += 1;
    }
}

/// Runs both sides of `session` concurrently and waits for both of them.
pub(crate) async fn run_session<P, C, PO, CO>(
    session: &CopySession,
    producer: P,
    consumer: C,
) -> Result<(PO, CO), CopyError>
where
    P: Future<Output = Result<PO, CopyError>>,
    C: Future<Output = Result<CO, CopyError>>,
{
    session.start();
    let (produced, consumed) = join(
        MarkDone::new(producer, session, Side::Producer),
        MarkDone::new(consumer, session, Side::Consumer),
    )
    .await;
    debug_assert!(session.is_completed());
    session.resolve(produced, consumed)
}

/// Records a fault of `side` and raises the session's cancellation flag.
///
/// `Cancelled` is a consequence of the other side's fault and is not
/// recorded.
pub(crate) fn record_fault(session: &CopySession, side: Side, error: &CopyError) {
    if error.is_cancelled() {
        return;
    }
    if session.cancel(side) {
        warn!(%side, error = %error, "side faulted, cancelling session");
    }
}

/// Reads from the source, retrying interrupted reads.
pub(crate) async fn read_source<R>(source: &mut R, buf: &mut [u8]) -> Result<usize, CopyError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match source.read(buf).await {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::SourceUnreadable(e)),
        }
    }
}

pub(crate) fn pipe_report(
    strategy: Strategy,
    started: Instant,
    stats: PipeStats,
    drained: Drained,
) -> CopyReport {
    CopyReport {
        strategy,
        elapsed: started.elapsed(),
        bytes_copied: drained.bytes,
        chunks_written: drained.writes,
        buffers_allocated: stats.segments_allocated,
        bytes_allocated: stats.bytes_allocated,
        peak_resident_buffers: stats.peak_segments,
        peak_queued_chunks: stats.peak_segments,
    }
}
