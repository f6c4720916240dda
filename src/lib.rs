//! pipecopy
//!
//! Overlapped source-to-destination byte streaming.
//!
//! `pipecopy` moves every byte of a readable stream into a writable stream
//! while reading and writing overlap. Three interchangeable engines do the
//! work:
//!
//! - **segmented**: reads straight into segments of an in-memory pipe
//! - **bulk**: the same pipe, filled by a single stream-to-writer copy
//! - **pooled**: rented buffers pushed through a bounded queue
//!
//! All of them keep memory bounded (pipe thresholds or queue capacity), stop
//! both sides when either one faults, and report how much transfer memory
//! they used.
//!
//! The crate intentionally:
//! - does NOT open files or paths (the `pipecopy` binary does)
//! - does NOT pick an async runtime (streams are `futures-io` traits)
//! - does NOT verify or checksum what it copied
//!
//! # Example
//!
//! ```
//! use pipecopy::{copy, CopyConfig, Strategy};
//!
//! # tokio_test::block_on(async {
//! let data = vec![7u8; 200_000];
//! for strategy in Strategy::ALL {
//!     let mut out = Vec::new();
//!     let report = copy(strategy, &data[..], &mut out, &CopyConfig::default()).await?;
//!     assert_eq!(out, data);
//!     println!("{report}");
//! }
//! # Ok::<(), pipecopy::CopyError>(())
//! # }).unwrap();
//! ```
//!
//! # Tokio streams
//!
//! ```ignore
//! use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
//!
//! let source = tokio::fs::File::open("in.bin").await?.compat();
//! let destination = tokio::fs::File::create("out.bin").await?.compat_write();
//! pipecopy::copy(Strategy::PooledQueue, source, destination, &CopyConfig::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod channel;
mod chunk;
mod config;
mod engine;
mod error;
mod report;
mod session;

pub mod pipe;

#[cfg(feature = "cli")]
pub mod cli;

//
// Public surface
//

pub use buffer::{BufferPool, PoolStats};
pub use channel::{BoundedChannel, Closed};
pub use chunk::Chunk;
pub use config::{
    CopyConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL_CAPACITY, DEFAULT_PAUSE_THRESHOLD,
    DEFAULT_RESUME_THRESHOLD, DEFAULT_SEGMENT_SIZE, MAX_BUFFER_SIZE, MAX_CHANNEL_CAPACITY,
};
pub use engine::{
    BulkPipeEngine, CopyEngine, PooledQueueEngine, SegmentedPipeEngine, Strategy, copy,
};
pub use error::CopyError;
pub use report::CopyReport;
pub use session::{CopySession, SessionState, Side};

/// Crate version, as reported by `pipecopy --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
