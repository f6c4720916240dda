//! Engine A: segmented-buffer pipe.
//!
//! The producer asks the pipe for a segment of at least `segment_size`
//! bytes, reads the source straight into it, commits what was read and
//! flushes. The consumer takes each published view, writes its segments in
//! order and advances past them. Backpressure comes from the pipe's pause
//! threshold.

use std::time::Instant;

use futures_io::{AsyncRead, AsyncWrite};
use futures_util::io::AsyncWriteExt;
use tracing::{debug, trace};

use super::{CopyEngine, Drained, Strategy, pipe_report, read_source, record_fault, run_session};
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::pipe::{PipeOptions, PipeReader, PipeStats, PipeWriter, pipe};
use crate::report::CopyReport;
use crate::session::{CopySession, Side};

/// Engine A: manual chunked reads into pipe segments.
///
/// ```
/// use pipecopy::{CopyConfig, CopyEngine, SegmentedPipeEngine};
///
/// # tokio_test::block_on(async {
/// let engine = SegmentedPipeEngine::new(CopyConfig::wide_segments());
/// let mut out = Vec::new();
/// let report = engine.copy(&b"abc"[..], &mut out).await?;
/// assert_eq!(out, b"abc");
/// assert_eq!(report.bytes_copied, 3);
/// # Ok::<(), pipecopy::CopyError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SegmentedPipeEngine {
    config: CopyConfig,
}

impl SegmentedPipeEngine {
    /// Creates the engine.
    pub fn new(config: CopyConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }
}

impl Default for SegmentedPipeEngine {
    fn default() -> Self {
        Self::new(CopyConfig::default())
    }
}

impl CopyEngine for SegmentedPipeEngine {
    fn strategy(&self) -> Strategy {
        Strategy::SegmentedPipe
    }

    async fn copy<R, W>(&self, mut source: R, destination: W) -> Result<CopyReport, CopyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.config.validate()?;
        let started = Instant::now();
        let session = CopySession::new();
        let (writer, reader) = pipe(PipeOptions::from_config(&self.config));

        let producer = fill_pipe(&mut source, writer, self.config.segment_size(), &session);
        let consumer = drain_pipe(reader, destination, &session);
        let (stats, drained) = run_session(&session, producer, consumer).await?;

        Ok(pipe_report(self.strategy(), started, stats, drained))
    }
}

async fn fill_pipe<R>(
    source: &mut R,
    mut writer: PipeWriter,
    segment_size: usize,
    session: &CopySession,
) -> Result<PipeStats, CopyError>
where
    R: AsyncRead + Unpin,
{
    let outcome = read_segments(source, &mut writer, segment_size).await;
    if let Err(e) = &outcome {
        record_fault(session, Side::Producer, e);
    }

    let stats = writer.stats();
    writer.complete();
    let total = outcome?;
    debug!(total, "producer finished");
    Ok(stats)
}

async fn read_segments<R>(
    source: &mut R,
    writer: &mut PipeWriter,
    segment_size: usize,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
{
    let mut total = 0u64;
    loop {
        let memory = writer.get_memory(segment_size);
        let n = read_source(source, memory).await?;
        if n == 0 {
            return Ok(total);
        }

        writer.advance(n);
        total += n as u64;
        trace!(n, total, "segment filled");

        if writer.flush().await.is_completed {
            debug!(total, "consumer completed early, producer stopping");
            return Ok(total);
        }
    }
}

/// Consumer shared by both pipe engines.
pub(super) async fn drain_pipe<W>(
    mut reader: PipeReader,
    mut destination: W,
    session: &CopySession,
) -> Result<Drained, CopyError>
where
    W: AsyncWrite + Unpin,
{
    let mut drained = Drained::default();
    let outcome = write_views(&mut reader, &mut destination, session, &mut drained).await;
    if let Err(e) = &outcome {
        record_fault(session, Side::Consumer, e);
    }

    reader.complete();
    outcome?;
    debug!(bytes = drained.bytes, writes = drained.writes, "consumer finished");
    Ok(drained)
}

async fn write_views<W>(
    reader: &mut PipeReader,
    destination: &mut W,
    session: &CopySession,
    drained: &mut Drained,
) -> Result<(), CopyError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let result = reader.read().await;
        if session.is_cancelled() {
            return Err(CopyError::Cancelled);
        }

        for segment in result.buffer.segments() {
            destination
                .write_all(segment)
                .await
                .map_err(CopyError::DestinationUnwritable)?;
            drained.record(segment.len());
            trace!(len = segment.len(), "segment written");
        }
        reader.advance(result.buffer.len());

        if result.is_completed {
            break;
        }
    }

    destination
        .flush()
        .await
        .map_err(CopyError::DestinationUnwritable)
}
