//! Writer half of the pipe.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use futures_io::AsyncWrite;
use tracing::{debug, trace};

use super::{PipeOptions, PipeStats, Shared};

/// Outcome of [`PipeWriter::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    /// The reader has completed; nothing written from now on will be read.
    pub is_completed: bool,
}

/// Producer side of a [`pipe`](super::pipe).
///
/// Bytes go through three steps: [`get_memory`](Self::get_memory) reserves
/// writable space, [`advance`](Self::advance) commits how much of it was
/// filled, and [`flush`](Self::flush) publishes everything committed to the
/// reader, waiting if the reader is too far behind.
///
/// The writer completes exactly once, either through
/// [`complete`](Self::complete) or on drop.
pub struct PipeWriter {
    shared: Arc<Shared>,
    options: PipeOptions,
    // Unpublished part of the current segment, zeroed once on allocation:
    // `staging[..filled]` is committed data, the rest is free room.
    staging: BytesMut,
    filled: usize,
    reserved: bool,
    completed: bool,
}

impl PipeWriter {
    pub(super) fn new(shared: Arc<Shared>, options: PipeOptions) -> Self {
        Self {
            shared,
            options,
            staging: BytesMut::new(),
            filled: 0,
            reserved: false,
            completed: false,
        }
    }

    /// Returns writable memory of at least `min` bytes (at least one byte).
    ///
    /// When the current segment has less room than that, a new segment of
    /// `max(min, segment_size)` bytes is allocated. A reservation that was
    /// never [`advance`](Self::advance)d is dropped.
    pub fn get_memory(&mut self, min: usize) -> &mut [u8] {
        self.reserved = false;
        let min = min.max(1);

        if self.room() < min {
            self.commit();
            let capacity = min.max(self.options.segment_size);
            self.staging = BytesMut::zeroed(capacity);

            let mut state = self.shared.state.lock();
            state.stats.segments_allocated += 1;
            state.stats.bytes_allocated += capacity;
            drop(state);
            trace!(capacity, "segment allocated");
        }

        self.reserved = true;
        &mut self.staging[self.filled..]
    }

    /// Commits the first `n` bytes of the last [`get_memory`](Self::get_memory)
    /// reservation.
    pub fn advance(&mut self, n: usize) {
        if std::mem::take(&mut self.reserved) {
            self.filled = (self.filled + n).min(self.staging.len());
        } else {
            debug_assert_eq!(n, 0, "advance without get_memory");
        }
    }

    /// Publishes committed bytes to the reader and applies backpressure.
    pub async fn flush(&mut self) -> FlushResult {
        poll_fn(|cx| self.poll_flush_result(cx)).await
    }

    /// Marks the writer complete after publishing committed bytes.
    ///
    /// Later calls have no effect.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.commit();
        self.completed = true;
        self.shared.state.lock().writer_completed = true;
        self.shared.reader_waker.wake();
        debug!("pipe writer completed");
    }

    /// Returns true once the reader has completed.
    pub fn is_reader_completed(&self) -> bool {
        self.shared.state.lock().reader_completed
    }

    /// Memory counters of the pipe.
    pub fn stats(&self) -> PipeStats {
        self.shared.state.lock().stats
    }

    fn room(&self) -> usize {
        self.staging.len() - self.filled
    }

    fn commit(&mut self) {
        self.reserved = false;
        if self.filled == 0 {
            return;
        }

        let segment = self.staging.split_to(self.filled).freeze();
        self.filled = 0;
        let len = segment.len();
        {
            let mut state = self.shared.state.lock();
            if state.reader_completed {
                return;
            }
            state.publish(segment);
        }
        trace!(len, "segment published");
        self.shared.reader_waker.wake();
    }

    fn poll_flush_result(&mut self, cx: &mut Context<'_>) -> Poll<FlushResult> {
        self.commit();
        self.poll_backpressure(cx)
    }

    // Ready once the writer may continue: not paused, or drained down to the
    // resume threshold, or the reader is gone.
    fn poll_backpressure(&mut self, cx: &mut Context<'_>) -> Poll<FlushResult> {
        self.shared.writer_waker.register(cx.waker());

        let mut state = self.shared.state.lock();
        if state.reader_completed {
            return Poll::Ready(FlushResult { is_completed: true });
        }
        if state.buffered >= self.options.pause_threshold {
            if !state.writer_paused {
                trace!(buffered = state.buffered, "writer paused");
            }
            state.writer_paused = true;
        }
        if state.writer_paused {
            if state.buffered > self.options.resume_threshold {
                return Poll::Pending;
            }
            state.writer_paused = false;
        }
        Poll::Ready(FlushResult {
            is_completed: false,
        })
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader completed")
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.completed {
            return Poll::Ready(Err(broken_pipe()));
        }

        let pressure = ready!(this.poll_backpressure(cx));
        if pressure.is_completed {
            return Poll::Ready(Err(broken_pipe()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let segment_size = this.options.segment_size;
        let memory = this.get_memory(buf.len().min(segment_size));
        let n = memory.len().min(buf.len());
        memory[..n].copy_from_slice(&buf[..n]);
        this.advance(n);

        if this.filled >= segment_size || this.room() == 0 {
            this.commit();
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_flush_result(cx));
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_flush_result(cx));
        this.complete();
        Poll::Ready(Ok(()))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.complete();
    }
}
