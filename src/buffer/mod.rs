//! Buffer management for the pooled-queue engine.
//!
//! [`BufferPool`] hands out fixed-size buffers and takes them back for reuse,
//! so a steady-state copy stops allocating once the queue is full.

mod pool;

pub use pool::{BufferPool, PoolStats};
