//! Reader half of the pipe.

use std::future::poll_fn;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tracing::debug;

use super::{PipeStats, Shared};

/// Ordered view of the published, unconsumed segments of a pipe.
#[derive(Debug, Clone, Default)]
pub struct ReadBuffer {
    segments: Vec<Bytes>,
    len: usize,
}

impl ReadBuffer {
    /// Total bytes across all segments.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the view holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The contiguous segments, in write order.
    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    /// Copies the view into one vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }
}

/// Outcome of [`PipeReader::read`].
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// Every byte published and not yet consumed.
    pub buffer: ReadBuffer,
    /// The writer has completed, so `buffer` holds everything that is left.
    pub is_completed: bool,
}

/// Consumer side of a [`pipe`](super::pipe).
///
/// The reader completes exactly once, either through
/// [`complete`](Self::complete) or on drop. Completing early tells the writer
/// to stop producing.
pub struct PipeReader {
    shared: Arc<Shared>,
    completed: bool,
}

impl PipeReader {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            completed: false,
        }
    }

    /// Waits until data is available or the writer completes.
    pub async fn read(&mut self) -> ReadResult {
        poll_fn(|cx| self.poll_read(cx)).await
    }

    /// Poll form of [`read`](Self::read).
    pub fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<ReadResult> {
        self.shared.reader_waker.register(cx.waker());

        let state = self.shared.state.lock();
        if state.segments.is_empty() && !state.writer_completed && !self.completed {
            return Poll::Pending;
        }

        let buffer = ReadBuffer {
            segments: state.segments.iter().cloned().collect(),
            len: state.buffered,
        };
        Poll::Ready(ReadResult {
            buffer,
            is_completed: state.writer_completed || self.completed,
        })
    }

    /// Releases the first `consumed` bytes of the pipe.
    pub fn advance(&mut self, consumed: usize) {
        let mut state = self.shared.state.lock();
        let mut remaining = consumed;
        while remaining > 0 {
            let Some(front) = state.segments.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                state.segments.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }

        let released = consumed - remaining;
        state.buffered -= released;
        let wake = released > 0 && state.writer_paused;
        drop(state);

        if wake {
            self.shared.writer_waker.wake();
        }
    }

    /// Marks the reader complete and drops unconsumed data.
    ///
    /// Later calls have no effect.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        {
            let mut state = self.shared.state.lock();
            state.reader_completed = true;
            state.segments.clear();
            state.buffered = 0;
        }
        self.shared.writer_waker.wake();
        debug!("pipe reader completed");
    }

    /// Memory counters of the pipe.
    pub fn stats(&self) -> PipeStats {
        self.shared.state.lock().stats
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.complete();
    }
}
