//! Copy session bookkeeping shared by the producer and consumer sides.
//!
//! - [`CopySession`] - Completion state, cancellation flag, first-fault record
//! - [`SessionState`] - `Idle -> Running -> ProducerDone | ConsumerDone -> Completed`
//! - [`Side`] - Which half of the session an event belongs to

mod state;

pub use state::{CopySession, SessionState, Side};

pub(crate) use state::MarkDone;
