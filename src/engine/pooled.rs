//! Engine C: pooled-buffer queue.
//!
//! The producer rents a buffer, reads into it and pushes it through a
//! [`BoundedChannel`] as a [`Chunk`] that knows its valid length. The
//! consumer pops, writes the valid bytes and gives the buffer back to the
//! [`BufferPool`]. Backpressure is the channel capacity; allocation stops
//! once enough buffers circulate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures_io::{AsyncRead, AsyncWrite};
use futures_util::io::AsyncWriteExt;
use tracing::{debug, trace};

use super::{CopyEngine, Drained, Strategy, read_source, record_fault, run_session};
use crate::buffer::BufferPool;
use crate::channel::{BoundedChannel, Closed};
use crate::chunk::Chunk;
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::report::CopyReport;
use crate::session::{CopySession, Side};

/// Engine C: pooled buffers through a bounded channel.
///
/// The pool can be shared between engines running at the same time with
/// [`PooledQueueEngine::with_pool`].
///
/// ```
/// use std::sync::Arc;
/// use pipecopy::{BufferPool, CopyConfig, CopyEngine, PooledQueueEngine};
///
/// # tokio_test::block_on(async {
/// let config = CopyConfig::default().with_buffer_size(4).with_channel_capacity(2);
/// let pool = Arc::new(BufferPool::new(4, 8));
/// let engine = PooledQueueEngine::with_pool(config, pool.clone());
///
/// let mut out = Vec::new();
/// engine.copy(&b"0123456789"[..], &mut out).await?;
/// assert_eq!(out, b"0123456789");
/// assert_eq!(pool.stats().outstanding, 0);
/// # Ok::<(), pipecopy::CopyError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PooledQueueEngine {
    config: CopyConfig,
    pool: Arc<BufferPool>,
}

impl PooledQueueEngine {
    /// Creates the engine with its own buffer pool.
    pub fn new(config: CopyConfig) -> Self {
        let pool = Arc::new(BufferPool::new(
            config.buffer_size(),
            config.pool_retention(),
        ));
        Self { config, pool }
    }

    /// Creates the engine on a shared buffer pool.
    ///
    /// The pool's buffer size should be at least the configured buffer size.
    pub fn with_pool(config: CopyConfig, pool: Arc<BufferPool>) -> Self {
        Self { config, pool }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// The buffer pool the engine rents from.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

impl Default for PooledQueueEngine {
    fn default() -> Self {
        Self::new(CopyConfig::default())
    }
}

impl CopyEngine for PooledQueueEngine {
    fn strategy(&self) -> Strategy {
        Strategy::PooledQueue
    }

    async fn copy<R, W>(&self, mut source: R, destination: W) -> Result<CopyReport, CopyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.config.validate()?;
        let started = Instant::now();
        let session = CopySession::new();
        let channel = BoundedChannel::new(self.config.channel_capacity());
        let buffers = SessionBuffers::new(&self.pool);

        let producer = produce_chunks(
            &mut source,
            &channel,
            &buffers,
            self.config.buffer_size(),
            &session,
        );
        let consumer = consume_chunks(&channel, destination, &buffers, &session);
        let (_, drained) = run_session(&session, producer, consumer).await?;

        Ok(CopyReport {
            strategy: self.strategy(),
            elapsed: started.elapsed(),
            bytes_copied: drained.bytes,
            chunks_written: drained.writes,
            buffers_allocated: buffers.allocated.load(Ordering::Relaxed),
            bytes_allocated: buffers.bytes_allocated.load(Ordering::Relaxed),
            peak_resident_buffers: buffers.peak.load(Ordering::Relaxed),
            peak_queued_chunks: channel.peak_len(),
        })
    }
}

/// One session's view of the pool.
///
/// Counts only the buffers this session rents, so a pool shared with other
/// sessions does not leak their figures into this session's report.
struct SessionBuffers<'a> {
    pool: &'a BufferPool,
    held: AtomicUsize,
    peak: AtomicUsize,
    allocated: AtomicUsize,
    bytes_allocated: AtomicUsize,
}

impl<'a> SessionBuffers<'a> {
    fn new(pool: &'a BufferPool) -> Self {
        Self {
            pool,
            held: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
            bytes_allocated: AtomicUsize::new(0),
        }
    }

    fn rent(&self, size: usize) -> Vec<u8> {
        let held = self.held.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak.fetch_max(held, Ordering::Relaxed);

        let (buffer, fresh) = self.pool.rent_counted(size);
        if fresh > 0 {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            self.bytes_allocated.fetch_add(fresh, Ordering::Relaxed);
        }
        buffer
    }

    fn give_back(&self, buffer: Vec<u8>) {
        self.held.fetch_sub(1, Ordering::Relaxed);
        self.pool.give_back(buffer);
    }
}

async fn produce_chunks<R>(
    source: &mut R,
    channel: &BoundedChannel<Chunk>,
    buffers: &SessionBuffers<'_>,
    buffer_size: usize,
    session: &CopySession,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
{
    let outcome = fill_queue(source, channel, buffers, buffer_size, session).await;
    if let Err(e) = &outcome {
        record_fault(session, Side::Producer, e);
    }

    channel.close();
    let total = outcome?;
    debug!(total, "producer finished");
    Ok(total)
}

async fn fill_queue<R>(
    source: &mut R,
    channel: &BoundedChannel<Chunk>,
    buffers: &SessionBuffers<'_>,
    buffer_size: usize,
    session: &CopySession,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
{
    let mut offset = 0u64;
    loop {
        if session.is_cancelled() {
            return Err(CopyError::Cancelled);
        }

        let mut buffer = buffers.rent(buffer_size);
        let n = match read_source(source, &mut buffer[..buffer_size]).await {
            Ok(n) => n,
            Err(e) => {
                buffers.give_back(buffer);
                return Err(e);
            }
        };
        if n == 0 {
            buffers.give_back(buffer);
            return Ok(offset);
        }

        let chunk = Chunk::new(buffer, n, offset);
        offset += n as u64;
        trace!(len = n, offset, "chunk read");

        if let Err(Closed(chunk)) = channel.push(chunk).await {
            buffers.give_back(chunk.into_buffer());
            return Err(CopyError::Cancelled);
        }
    }
}

async fn consume_chunks<W>(
    channel: &BoundedChannel<Chunk>,
    mut destination: W,
    buffers: &SessionBuffers<'_>,
    session: &CopySession,
) -> Result<Drained, CopyError>
where
    W: AsyncWrite + Unpin,
{
    let mut drained = Drained::default();
    let outcome = write_chunks(channel, &mut destination, buffers, session, &mut drained).await;

    if let Err(e) = &outcome {
        record_fault(session, Side::Consumer, e);
        channel.close();
        while let Some(chunk) = channel.try_pop() {
            buffers.give_back(chunk.into_buffer());
        }
    }

    outcome?;
    debug!(bytes = drained.bytes, writes = drained.writes, "consumer finished");
    Ok(drained)
}

async fn write_chunks<W>(
    channel: &BoundedChannel<Chunk>,
    destination: &mut W,
    buffers: &SessionBuffers<'_>,
    session: &CopySession,
    drained: &mut Drained,
) -> Result<(), CopyError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = channel.pop().await {
        if session.is_cancelled() {
            buffers.give_back(chunk.into_buffer());
            return Err(CopyError::Cancelled);
        }

        let written = destination.write_all(chunk.as_slice()).await;
        let len = chunk.len();
        buffers.give_back(chunk.into_buffer());
        written.map_err(CopyError::DestinationUnwritable)?;

        drained.record(len);
        trace!(len, "chunk written");
    }

    destination
        .flush()
        .await
        .map_err(CopyError::DestinationUnwritable)
}
