//! Fixed-capacity FIFO with blocking push and pop.

use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Error returned by [`BoundedChannel::push`] after the channel was closed.
///
/// Carries the rejected item so its owner can reclaim it.
#[derive(Debug, PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> Closed<T> {
    /// Returns the item that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T: fmt::Debug> std::error::Error for Closed<T> {}

/// A bounded handoff queue between producer and consumer tasks.
///
/// - `push` waits while `capacity` items are queued.
/// - `pop` waits while the queue is empty and open, and returns `None` once
///   the channel is closed and every queued item has been taken.
/// - `close` may be called by either side; queued items stay poppable.
///
/// Any number of tasks may push and pop concurrently. Waiters register for
/// a wakeup before inspecting the queue, so neither a push, a pop nor a close
/// can slip between the check and the wait.
///
/// ```
/// use pipecopy::BoundedChannel;
///
/// # tokio_test::block_on(async {
/// let channel = BoundedChannel::new(2);
/// channel.push(1).await.unwrap();
/// channel.push(2).await.unwrap();
/// channel.close();
///
/// assert_eq!(channel.pop().await, Some(1));
/// assert_eq!(channel.pop().await, Some(2));
/// assert_eq!(channel.pop().await, None);
/// # });
/// ```
pub struct BoundedChannel<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_full: Notify,
    not_empty: Notify,
}

// Larger queues grow on demand.
const PREALLOCATED: usize = 64;

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
    peak_len: usize,
}

impl<T> BoundedChannel<T> {
    /// Creates an open channel holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(PREALLOCATED)),
                closed: false,
                peak_len: 0,
            }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
        }
    }

    /// Appends `item`, waiting for room while the channel is full.
    ///
    /// Fails with the item if the channel is, or becomes, closed before the
    /// item is queued.
    pub async fn push(&self, item: T) -> Result<(), Closed<T>> {
        loop {
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(Closed(item));
                }
                if state.queue.len() < self.capacity {
                    state.queue.push_back(item);
                    state.peak_len = state.peak_len.max(state.queue.len());
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Removes the oldest item, waiting while the channel is empty and open.
    ///
    /// Returns `None` when the channel is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();

            if let Some(outcome) = self.take() {
                return outcome;
            }

            notified.await;
        }
    }

    /// Removes the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.take().flatten()
    }

    // Some(Some(item)) when an item was taken, Some(None) when closed and
    // drained, None when the caller has to wait.
    fn take(&self) -> Option<Option<T>> {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(item) => {
                let more = !state.queue.is_empty();
                drop(state);
                self.not_full.notify_one();
                if more {
                    // Hand the remaining items to another waiting consumer.
                    self.not_empty.notify_one();
                }
                Some(Some(item))
            }
            None if state.closed => Some(None),
            None => None,
        }
    }

    /// Marks the channel closed and wakes every waiter.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns true if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest number of items that were ever queued at once.
    pub fn peak_len(&self) -> usize {
        self.state.lock().peak_len
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.capacity)
            .field("len", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
