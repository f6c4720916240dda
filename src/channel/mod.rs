//! Bounded handoff between producer and consumer.
//!
//! - [`BoundedChannel`] - Fixed-capacity FIFO; full blocks the producer,
//!   empty blocks the consumer
//! - [`Closed`] - Push rejected because the channel was closed

mod bounded;

pub use bounded::{BoundedChannel, Closed};
