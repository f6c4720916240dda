//! Shared pool of fixed-size byte buffers.

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Reuse pool of fixed-capacity byte buffers.
///
/// `rent` hands out a buffer of at least the requested size, taken from the
/// free list when one is available and freshly allocated otherwise. A rented
/// buffer belongs to the renter until it is passed back to
/// [`BufferPool::give_back`]. Recycled buffers keep their previous contents;
/// callers track the valid length themselves.
///
/// The pool is `Send + Sync` and is normally shared through an `Arc`.
///
/// ```
/// use pipecopy::BufferPool;
///
/// let pool = BufferPool::new(1024, 4);
/// let buf = pool.rent(1024);
/// assert!(buf.len() >= 1024);
/// pool.give_back(buf);
///
/// let again = pool.rent(512);
/// assert_eq!(pool.stats().allocated, 1);
/// # drop(again);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    max_retained: usize,
    inner: Mutex<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    free: Vec<Vec<u8>>,
    stats: PoolStats,
}

/// Counters describing how a [`BufferPool`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers freshly allocated by `rent`.
    pub allocated: usize,
    /// Bytes freshly allocated by `rent`.
    pub bytes_allocated: usize,
    /// Total `rent` calls.
    pub rents: usize,
    /// `rent` calls served from the free list.
    pub reused: usize,
    /// Buffers currently rented out.
    pub outstanding: usize,
    /// Highest value `outstanding` has reached.
    pub peak_outstanding: usize,
}

impl BufferPool {
    /// Creates an empty pool of `buffer_size`-byte buffers keeping at most
    /// `max_retained` idle buffers.
    pub fn new(buffer_size: usize, max_retained: usize) -> Self {
        Self {
            buffer_size,
            max_retained,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Size of the buffers this pool allocates.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Rents a buffer whose length is at least `size`.
    ///
    /// Requests larger than the pool's buffer size are served with a
    /// dedicated allocation.
    pub fn rent(&self, size: usize) -> Vec<u8> {
        self.rent_counted(size).0
    }

    /// Like [`rent`](Self::rent), also returning how many bytes were freshly
    /// allocated (zero for a recycled buffer).
    pub(crate) fn rent_counted(&self, size: usize) -> (Vec<u8>, usize) {
        let mut inner = self.inner.lock();
        inner.stats.rents += 1;
        inner.stats.outstanding += 1;
        inner.stats.peak_outstanding = inner.stats.peak_outstanding.max(inner.stats.outstanding);

        if size <= self.buffer_size {
            if let Some(buf) = inner.free.pop() {
                inner.stats.reused += 1;
                trace!(free = inner.free.len(), "buffer reused");
                return (buf, 0);
            }
        }

        let len = size.max(self.buffer_size);
        inner.stats.allocated += 1;
        inner.stats.bytes_allocated += len;
        drop(inner);

        trace!(len, "buffer allocated");
        (vec![0u8; len], len)
    }

    /// Returns a rented buffer to the pool.
    ///
    /// Buffers shorter than the pool's buffer size were not rented from it
    /// and are dropped. Returns beyond the retention limit are dropped too.
    pub fn give_back(&self, buf: Vec<u8>) {
        if buf.len() < self.buffer_size {
            debug!(
                len = buf.len(),
                expected = self.buffer_size,
                "rejecting buffer not rented from this pool"
            );
            return;
        }

        let mut inner = self.inner.lock();
        inner.stats.outstanding = inner.stats.outstanding.saturating_sub(1);
        if inner.free.len() < self.max_retained {
            inner.free.push(buf);
        }
    }

    /// Number of idle buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }
}
