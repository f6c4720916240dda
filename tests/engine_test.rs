// Integration tests for the copy engines
// Tests cover: round trips, strategy equivalence, fault propagation,
// backpressure bounds, buffer reuse, tokio file streams

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_io::{AsyncRead, AsyncWrite};
use pipecopy::{
    BufferPool, BulkPipeEngine, CopyConfig, CopyEngine, CopyError, PooledQueueEngine,
    SegmentedPipeEngine, Strategy, copy,
};

const BUFFER: usize = 65535;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 13) as u8).collect()
}

async fn copy_all(strategy: Strategy, data: &[u8]) -> (Vec<u8>, pipecopy::CopyReport) {
    let mut out = Vec::new();
    let report = copy(strategy, data, &mut out, &CopyConfig::default())
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", strategy, e));
    (out, report)
}

/// Destination that accepts `ok_writes` write calls, then fails every call.
struct FailingWriter {
    written: Vec<u8>,
    ok_writes: usize,
    calls: usize,
}

impl FailingWriter {
    fn new(ok_writes: usize) -> Self {
        Self {
            written: Vec::new(),
            ok_writes,
            calls: 0,
        }
    }
}

impl AsyncWrite for FailingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.calls += 1;
        if self.calls > self.ok_writes {
            return Poll::Ready(Err(io::Error::other("disk full")));
        }
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Source that serves `data` in reads of at most `step` bytes, then fails.
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    step: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        if self.pos == self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "device removed",
            )));
        }
        let n = buf.len().min(self.step).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Poll::Ready(Ok(n))
    }
}

/// Source of endless bytes that counts its reads. Reports end of stream after
/// `limit` reads so a producer that ignores cancellation still terminates.
struct CountingSource {
    reads: usize,
    limit: usize,
}

impl AsyncRead for CountingSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        if self.reads == self.limit {
            return Poll::Ready(Ok(0));
        }
        self.reads += 1;
        buf.fill(0x42);
        Poll::Ready(Ok(buf.len()))
    }
}

/// Destination that returns `Pending` on every other write, so the producer
/// runs ahead and fills the queue.
struct SluggishWriter {
    written: Vec<u8>,
    stalled: bool,
}

impl AsyncWrite for SluggishWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.stalled {
            self.stalled = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.stalled = false;
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ============================================================================
// Round Trips
// ============================================================================

#[tokio::test]
async fn test_empty_source_all_strategies() {
    for strategy in Strategy::ALL {
        let (out, report) = copy_all(strategy, &[]).await;

        assert!(out.is_empty(), "{} wrote bytes for an empty source", strategy);
        assert_eq!(report.bytes_copied, 0);
        assert_eq!(report.chunks_written, 0);
        assert_eq!(report.strategy, strategy);
    }
}

#[tokio::test]
async fn test_single_byte_all_strategies() {
    for strategy in Strategy::ALL {
        let (out, report) = copy_all(strategy, &[0xEE]).await;
        assert_eq!(out, [0xEE]);
        assert_eq!(report.bytes_copied, 1);
    }
}

#[tokio::test]
async fn test_one_buffer_minus_one_byte() {
    let data = pattern(BUFFER - 1);

    for strategy in Strategy::ALL {
        let (out, report) = copy_all(strategy, &data).await;
        assert_eq!(out, data, "{} corrupted the copy", strategy);
        assert_eq!(report.bytes_copied, data.len() as u64);
    }

    // One read, one write
    let (_, report) = copy_all(Strategy::PooledQueue, &data).await;
    assert_eq!(report.chunks_written, 1);
    let (_, report) = copy_all(Strategy::SegmentedPipe, &data).await;
    assert_eq!(report.chunks_written, 1);
}

#[tokio::test]
async fn test_several_buffers_plus_tail() {
    let data = pattern(10 * BUFFER + 137);

    for strategy in Strategy::ALL {
        let (out, report) = copy_all(strategy, &data).await;
        assert_eq!(out, data, "{} corrupted the copy", strategy);
        assert!(report.chunks_written > 1, "{} wrote a single chunk", strategy);
    }

    let (_, report) = copy_all(Strategy::PooledQueue, &data).await;
    assert_eq!(report.chunks_written, 11);
}

#[tokio::test]
async fn test_multi_megabyte() {
    let data = pattern(5 * 1024 * 1024 + 3);

    for strategy in Strategy::ALL {
        let (out, _) = copy_all(strategy, &data).await;
        assert_eq!(out.len(), data.len());
        assert!(out == data, "{} corrupted a multi-megabyte copy", strategy);
    }
}

#[tokio::test]
async fn test_wide_segments_round_trip() {
    let data = pattern(3 * 10 * BUFFER + 5);

    for strategy in [Strategy::SegmentedPipe, Strategy::BulkPipe] {
        let mut out = Vec::new();
        copy(strategy, &data[..], &mut out, &CopyConfig::wide_segments())
            .await
            .unwrap();
        assert_eq!(out, data);
    }
}

// ============================================================================
// Strategy Equivalence
// ============================================================================

#[tokio::test]
async fn test_strategies_produce_identical_output() {
    let data = pattern(777_777);
    let config = CopyConfig::default()
        .with_buffer_size(4096)
        .with_segment_size(1000)
        .with_channel_capacity(3)
        .with_pipe_thresholds(8192, 2048);

    let mut outputs = Vec::new();
    for strategy in Strategy::ALL {
        let mut out = Vec::new();
        copy(strategy, &data[..], &mut out, &config).await.unwrap();
        outputs.push(out);
    }

    assert!(outputs.iter().all(|out| *out == data));
}

#[tokio::test]
async fn test_engines_usable_through_trait() {
    async fn run<E: CopyEngine>(engine: &E, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let report = engine.copy(data, &mut out).await.unwrap();
        assert_eq!(report.strategy, engine.strategy());
        out
    }

    let data = pattern(100_000);
    assert_eq!(run(&SegmentedPipeEngine::default(), &data).await, data);
    assert_eq!(run(&BulkPipeEngine::default(), &data).await, data);
    assert_eq!(run(&PooledQueueEngine::default(), &data).await, data);
}

// ============================================================================
// Faults
// ============================================================================

#[tokio::test]
async fn test_destination_fault_on_second_write() {
    let data = pattern(10 * BUFFER + 137);

    for strategy in Strategy::ALL {
        let mut destination = FailingWriter::new(1);
        let outcome = copy(strategy, &data[..], &mut destination, &CopyConfig::default()).await;

        match outcome {
            Err(CopyError::DestinationUnwritable(e)) => assert_eq!(e.to_string(), "disk full"),
            other => panic!("{}: expected DestinationUnwritable, got {:?}", strategy, other),
        }
        // Non-atomic: the first write stays, nothing after it
        assert!(!destination.written.is_empty());
        assert!(destination.written.len() < data.len());
        assert!(data.starts_with(&destination.written));
    }
}

#[tokio::test]
async fn test_destination_fault_on_first_write() {
    for strategy in Strategy::ALL {
        let mut destination = FailingWriter::new(0);
        let outcome = copy(strategy, &b"x"[..], &mut destination, &CopyConfig::default()).await;

        assert!(matches!(outcome, Err(CopyError::DestinationUnwritable(_))));
        assert!(destination.written.is_empty());
    }
}

#[tokio::test]
async fn test_destination_fault_stops_producer() {
    let config = CopyConfig::default()
        .with_buffer_size(1024)
        .with_segment_size(1024);

    for strategy in Strategy::ALL {
        let mut source = CountingSource {
            reads: 0,
            limit: 100_000,
        };
        let mut destination = FailingWriter::new(0);
        let outcome = copy(strategy, &mut source, &mut destination, &config).await;

        assert!(matches!(outcome, Err(CopyError::DestinationUnwritable(_))));
        // Pause threshold worth of segments, or a queue's worth of chunks
        assert!(
            source.reads <= 256,
            "{} kept reading after the destination failed: {} reads",
            strategy,
            source.reads
        );
    }
}

#[tokio::test]
async fn test_source_fault_is_reported() {
    let data = pattern(3 * 4096);
    let config = CopyConfig::default()
        .with_buffer_size(4096)
        .with_segment_size(4096);

    for strategy in Strategy::ALL {
        let source = FailingReader {
            data: data.clone(),
            pos: 0,
            step: 4096,
        };
        let mut out = Vec::new();
        let outcome = copy(strategy, source, &mut out, &config).await;

        match outcome {
            Err(CopyError::SourceUnreadable(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("{}: expected SourceUnreadable, got {:?}", strategy, other),
        }
        assert!(data.starts_with(&out));
    }
}

#[tokio::test]
async fn test_invalid_strategy_never_reaches_core() {
    let err = "fastest".parse::<Strategy>().unwrap_err();
    assert!(matches!(err, CopyError::InvalidStrategy { .. }));
    assert!(err.to_string().contains("fastest"));
}

// ============================================================================
// Backpressure and Buffer Reuse
// ============================================================================

#[tokio::test]
async fn test_queue_never_exceeds_capacity() {
    let data = pattern(64 * 1024);
    let config = CopyConfig::default()
        .with_buffer_size(512)
        .with_channel_capacity(3);
    let mut destination = SluggishWriter {
        written: Vec::new(),
        stalled: false,
    };

    let report = PooledQueueEngine::new(config)
        .copy(&data[..], &mut destination)
        .await
        .unwrap();

    assert_eq!(destination.written, data);
    assert!(report.peak_queued_chunks <= 3);
    // Queue, plus one being filled and one being written
    assert!(report.peak_resident_buffers <= 5);
    assert!(report.buffers_allocated <= 5);
    assert_eq!(report.chunks_written, 128);
}

#[tokio::test]
async fn test_pipe_buffering_is_bounded() {
    let data = pattern(1024 * 1024);
    let config = CopyConfig::default()
        .with_segment_size(1024)
        .with_pipe_thresholds(4096, 2048);

    for strategy in [Strategy::SegmentedPipe, Strategy::BulkPipe] {
        let mut destination = SluggishWriter {
            written: Vec::new(),
            stalled: false,
        };
        let report = copy(strategy, &data[..], &mut destination, &config)
            .await
            .unwrap();

        assert_eq!(destination.written, data);
        // Pause threshold plus one segment in flight
        assert!(
            report.peak_resident_buffers <= 4096 / 1024 + 2,
            "{} buffered {} segments",
            strategy,
            report.peak_resident_buffers
        );
    }
}

#[tokio::test]
async fn test_shared_pool_across_sessions() {
    let pool = Arc::new(BufferPool::new(1024, 16));
    let config = CopyConfig::default()
        .with_buffer_size(1024)
        .with_channel_capacity(2);
    let first = PooledQueueEngine::with_pool(config, pool.clone());
    let second = PooledQueueEngine::with_pool(config, pool.clone());

    let a = pattern(200_000);
    let b: Vec<u8> = a.iter().rev().copied().collect();
    let mut out_a = Vec::new();
    let mut out_b = Vec::new();

    let (ra, rb) = tokio::join!(
        first.copy(&a[..], &mut out_a),
        second.copy(&b[..], &mut out_b)
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(out_a, a);
    assert_eq!(out_b, b);

    let stats = pool.stats();
    assert_eq!(stats.outstanding, 0);
    assert!(stats.reused > 0);
    assert!(stats.allocated <= 2 * 4);
}

#[tokio::test]
async fn test_repeated_copies_stop_allocating() {
    let engine = PooledQueueEngine::new(CopyConfig::default().with_buffer_size(2048));
    let data = pattern(100_000);

    let mut out = Vec::new();
    engine.copy(&data[..], &mut out).await.unwrap();

    for _ in 0..3 {
        let mut out = Vec::new();
        let report = engine.copy(&data[..], &mut out).await.unwrap();
        assert_eq!(out, data);
        assert_eq!(report.buffers_allocated, 0);
        assert_eq!(report.bytes_allocated, 0);
    }
}

// ============================================================================
// Tokio Streams
// ============================================================================

#[tokio::test]
async fn test_tokio_file_copy() {
    use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

    let dir = std::env::temp_dir();
    let data = pattern(3 * BUFFER + 11);

    for strategy in Strategy::ALL {
        let src = dir.join(format!("pipecopy-{}-{}.src", strategy, std::process::id()));
        let dst = dir.join(format!("pipecopy-{}-{}.dst", strategy, std::process::id()));
        tokio::fs::write(&src, &data).await.unwrap();

        let source = tokio::fs::File::open(&src).await.unwrap().compat();
        let destination = tokio::fs::File::create(&dst).await.unwrap().compat_write();
        let report = copy(strategy, source, destination, &CopyConfig::default())
            .await
            .unwrap();

        assert_eq!(report.bytes_copied, data.len() as u64);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), data);

        let _ = tokio::fs::remove_file(&src).await;
        let _ = tokio::fs::remove_file(&dst).await;
    }
}

#[tokio::test]
async fn test_tokio_duplex_copy() {
    use tokio::io::AsyncReadExt;
    use tokio_util::compat::TokioAsyncWriteCompatExt;

    let data = pattern(300_000);
    let (writer, mut reader) = tokio::io::duplex(4096);

    let expected = data.clone();
    let drain = tokio::spawn(async move {
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        received
    });

    let mut destination = writer.compat_write();
    copy(
        Strategy::SegmentedPipe,
        &data[..],
        &mut destination,
        &CopyConfig::default(),
    )
    .await
    .unwrap();
    drop(destination);

    assert_eq!(drain.await.unwrap(), expected);
}
