//! Session state machine and completion tracking.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tracing::{trace, warn};

use crate::error::CopyError;

const RUNNING: u8 = 0b001;
const PRODUCER_DONE: u8 = 0b010;
const CONSUMER_DONE: u8 = 0b100;

const NO_FAULT: u8 = 0;

/// One half of a copy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Reads the source.
    Producer,
    /// Writes the destination.
    Consumer,
}

impl Side {
    fn done_flag(self) -> u8 {
        match self {
            Side::Producer => PRODUCER_DONE,
            Side::Consumer => CONSUMER_DONE,
        }
    }

    fn fault_code(self) -> u8 {
        match self {
            Side::Producer => 1,
            Side::Consumer => 2,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Producer => write!(f, "producer"),
            Side::Consumer => write!(f, "consumer"),
        }
    }
}

/// Lifecycle of a copy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, sides not started.
    Idle,
    /// Both sides running.
    Running,
    /// The producer finished, the consumer is still running.
    ProducerDone,
    /// The consumer finished, the producer is still running.
    ConsumerDone,
    /// Both sides finished.
    Completed,
}

/// Shared completion and cancellation state of one producer/consumer pair.
///
/// Each side reports done exactly once. The first side to fault records
/// itself and raises the cancellation flag, which the other side checks at
/// its suspension points.
///
/// ```
/// use pipecopy::{CopySession, SessionState, Side};
///
/// let session = CopySession::new();
/// session.start();
/// assert!(session.producer_done());
/// assert!(!session.producer_done());
/// assert_eq!(session.state(), SessionState::ProducerDone);
/// assert!(session.consumer_done());
/// assert_eq!(session.state(), SessionState::Completed);
/// # let _ = Side::Producer;
/// ```
#[derive(Debug, Default)]
pub struct CopySession {
    flags: AtomicU8,
    cancelled: AtomicBool,
    first_fault: AtomicU8,
}

impl CopySession {
    /// Creates an idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the session to running. Returns false if it had already started.
    pub fn start(&self) -> bool {
        self.flags.fetch_or(RUNNING, Ordering::AcqRel) & RUNNING == 0
    }

    /// Records that `side` finished. Returns false if it already had.
    pub fn mark_done(&self, side: Side) -> bool {
        let flag = side.done_flag();
        let previous = self.flags.fetch_or(flag, Ordering::AcqRel);
        if previous & flag != 0 {
            warn!(%side, "side reported done twice");
            return false;
        }
        trace!(%side, "side done");
        true
    }

    /// Records that the producer finished.
    pub fn producer_done(&self) -> bool {
        self.mark_done(Side::Producer)
    }

    /// Records that the consumer finished.
    pub fn consumer_done(&self) -> bool {
        self.mark_done(Side::Consumer)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        let flags = self.flags.load(Ordering::Acquire);
        let producer = flags & PRODUCER_DONE != 0;
        let consumer = flags & CONSUMER_DONE != 0;
        match (producer, consumer) {
            (true, true) => SessionState::Completed,
            (true, false) => SessionState::ProducerDone,
            (false, true) => SessionState::ConsumerDone,
            (false, false) if flags & RUNNING != 0 => SessionState::Running,
            (false, false) => SessionState::Idle,
        }
    }

    /// Returns true once both sides have finished.
    pub fn is_completed(&self) -> bool {
        self.state() == SessionState::Completed
    }

    /// Raises the cancellation flag on behalf of the faulting `side`.
    ///
    /// Returns true if this was the first fault of the session.
    pub fn cancel(&self, side: Side) -> bool {
        self.cancelled.store(true, Ordering::Release);
        self.first_fault
            .compare_exchange(
                NO_FAULT,
                side.fault_code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns true once either side has faulted.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The side that faulted first, if any.
    pub fn first_fault(&self) -> Option<Side> {
        match self.first_fault.load(Ordering::Acquire) {
            1 => Some(Side::Producer),
            2 => Some(Side::Consumer),
            _ => None,
        }
    }

    /// Combines the outcomes of both sides into the session outcome.
    ///
    /// A real fault wins over [`CopyError::Cancelled`]; when both sides
    /// faulted for real, the first recorded fault is reported.
    pub fn resolve<P, C>(
        &self,
        producer: Result<P, CopyError>,
        consumer: Result<C, CopyError>,
    ) -> Result<(P, C), CopyError> {
        match (producer, consumer) {
            (Ok(p), Ok(c)) => Ok((p, c)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(p), Err(c)) => {
                if p.is_cancelled() {
                    Err(c)
                } else if c.is_cancelled() {
                    Err(p)
                } else if self.first_fault() == Some(Side::Consumer) {
                    Err(c)
                } else {
                    Err(p)
                }
            }
        }
    }
}

pin_project! {
    /// Future adapter that reports its side done when the inner future
    /// resolves, whatever the outcome.
    pub(crate) struct MarkDone<'a, F> {
        #[pin]
        inner: F,
        session: &'a CopySession,
        side: Side,
    }
}

impl<'a, F> MarkDone<'a, F> {
    pub(crate) fn new(inner: F, session: &'a CopySession, side: Side) -> Self {
        Self {
            inner,
            session,
            side,
        }
    }
}

impl<F: Future> Future for MarkDone<'_, F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = ready!(this.inner.poll(cx));
        this.session.mark_done(*this.side);
        Poll::Ready(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let session = CopySession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.start());
        assert!(!session.start());
        assert_eq!(session.state(), SessionState::Running);

        assert!(session.consumer_done());
        assert_eq!(session.state(), SessionState::ConsumerDone);
        assert!(session.producer_done());
        assert!(session.is_completed());
    }

    #[test]
    fn test_done_exactly_once() {
        let session = CopySession::new();
        session.start();
        assert!(session.producer_done());
        assert!(!session.producer_done());
        assert_eq!(session.state(), SessionState::ProducerDone);
    }

    #[test]
    fn test_first_fault_recorded() {
        let session = CopySession::new();
        assert!(!session.is_cancelled());
        assert!(session.cancel(Side::Consumer));
        assert!(!session.cancel(Side::Producer));
        assert!(session.is_cancelled());
        assert_eq!(session.first_fault(), Some(Side::Consumer));
    }

    #[test]
    fn test_resolve_prefers_real_fault() {
        let session = CopySession::new();
        let io = || std::io::Error::other("disk full");

        let outcome = session.resolve::<(), ()>(
            Err(CopyError::Cancelled),
            Err(CopyError::DestinationUnwritable(io())),
        );
        assert!(matches!(outcome, Err(CopyError::DestinationUnwritable(_))));

        let outcome = session.resolve::<u64, u64>(Ok(3), Ok(3));
        assert_eq!(outcome.unwrap(), (3, 3));
    }

    #[test]
    fn test_resolve_both_real_uses_first_fault() {
        let session = CopySession::new();
        session.cancel(Side::Consumer);
        session.cancel(Side::Producer);

        let outcome = session.resolve::<(), ()>(
            Err(CopyError::SourceUnreadable(std::io::Error::other("read"))),
            Err(CopyError::DestinationUnwritable(std::io::Error::other("write"))),
        );
        assert!(matches!(outcome, Err(CopyError::DestinationUnwritable(_))));
    }

    #[test]
    fn test_mark_done_future() {
        let session = CopySession::new();
        session.start();
        let value = tokio_test::block_on(MarkDone::new(async { 7 }, &session, Side::Producer));
        assert_eq!(value, 7);
        assert_eq!(session.state(), SessionState::ProducerDone);
    }
}
