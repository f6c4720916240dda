//! Configuration for copy sessions.
//!
//! - [`CopyConfig`] - Buffer, segment and queue sizing shared by all engines
//!
//! # Example
//!
//! ```
//! use pipecopy::CopyConfig;
//!
//! // Larger pooled buffers and a deeper queue
//! let config = CopyConfig::default()
//!     .with_buffer_size(128 * 1024)
//!     .with_channel_capacity(16);
//! config.validate()?;
//!
//! // Pipe segments ten times the default size
//! let wide = CopyConfig::wide_segments();
//! assert_eq!(wide.segment_size(), 10 * 65535);
//! # Ok::<(), pipecopy::CopyError>(())
//! ```

use crate::error::CopyError;

/// Default size of pooled buffers (Engine C).
pub const DEFAULT_BUFFER_SIZE: usize = 65535;

/// Default minimum pipe segment size (Engines A and B).
pub const DEFAULT_SEGMENT_SIZE: usize = 65535;

/// Default bounded channel capacity, in chunks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Default number of unconsumed pipe bytes at which the writer pauses.
pub const DEFAULT_PAUSE_THRESHOLD: usize = 64 * 1024;

/// Default number of unconsumed pipe bytes at which a paused writer resumes.
pub const DEFAULT_RESUME_THRESHOLD: usize = 32 * 1024;

/// Largest accepted pooled buffer or pipe segment size.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Largest accepted bounded channel capacity, in chunks.
pub const MAX_CHANNEL_CAPACITY: usize = 4096;

/// Configuration for a copy session.
///
/// Invariants checked by [`CopyConfig::validate`]: all sizes are non-zero,
/// buffer and segment sizes are at most [`MAX_BUFFER_SIZE`], the channel
/// capacity is at most [`MAX_CHANNEL_CAPACITY`] and
/// `resume_threshold <= pause_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyConfig {
    buffer_size: usize,
    segment_size: usize,
    channel_capacity: usize,
    pool_retention: usize,
    pause_threshold: usize,
    resume_threshold: usize,
}

impl CopyConfig {
    /// Creates a validated configuration from the three primary sizes.
    ///
    /// Pool retention follows the channel capacity; pipe thresholds keep
    /// their defaults.
    pub fn new(
        buffer_size: usize,
        segment_size: usize,
        channel_capacity: usize,
    ) -> Result<Self, CopyError> {
        let config = Self::default()
            .with_buffer_size(buffer_size)
            .with_segment_size(segment_size)
            .with_channel_capacity(channel_capacity);
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with pipe segments of ten times the default
    /// size.
    pub fn wide_segments() -> Self {
        Self::default().with_segment_size(DEFAULT_SEGMENT_SIZE * 10)
    }

    /// Sets the pooled buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the minimum pipe segment size.
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the bounded channel capacity.
    ///
    /// The pool keeps enough idle buffers for a full channel plus the one
    /// being filled and the one being written.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self.pool_retention = capacity.saturating_add(2);
        self
    }

    /// Sets how many idle buffers the pool keeps.
    pub fn with_pool_retention(mut self, retained: usize) -> Self {
        self.pool_retention = retained;
        self
    }

    /// Sets the pipe pause and resume thresholds.
    pub fn with_pipe_thresholds(mut self, pause: usize, resume: usize) -> Self {
        self.pause_threshold = pause;
        self.resume_threshold = resume;
        self
    }

    /// Returns the pooled buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the minimum pipe segment size.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Returns the bounded channel capacity.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Returns how many idle buffers the pool keeps.
    pub fn pool_retention(&self) -> usize {
        self.pool_retention
    }

    /// Returns the pipe pause threshold in bytes.
    pub fn pause_threshold(&self) -> usize {
        self.pause_threshold
    }

    /// Returns the pipe resume threshold in bytes.
    pub fn resume_threshold(&self) -> usize {
        self.resume_threshold
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), CopyError> {
        if self.buffer_size == 0 {
            return Err(CopyError::InvalidConfig {
                message: "buffer size must be non-zero",
            });
        }

        if self.segment_size == 0 {
            return Err(CopyError::InvalidConfig {
                message: "segment size must be non-zero",
            });
        }

        if self.channel_capacity == 0 {
            return Err(CopyError::InvalidConfig {
                message: "channel capacity must be non-zero",
            });
        }

        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(CopyError::InvalidConfig {
                message: "buffer size exceeds 64 MiB",
            });
        }

        if self.segment_size > MAX_BUFFER_SIZE {
            return Err(CopyError::InvalidConfig {
                message: "segment size exceeds 64 MiB",
            });
        }

        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(CopyError::InvalidConfig {
                message: "channel capacity exceeds 4096",
            });
        }

        if self.pause_threshold == 0 {
            return Err(CopyError::InvalidConfig {
                message: "pause threshold must be non-zero",
            });
        }

        if self.resume_threshold > self.pause_threshold {
            return Err(CopyError::InvalidConfig {
                message: "resume threshold cannot be greater than pause threshold",
            });
        }

        Ok(())
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            segment_size: DEFAULT_SEGMENT_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            pool_retention: DEFAULT_CHANNEL_CAPACITY + 2,
            pause_threshold: DEFAULT_PAUSE_THRESHOLD,
            resume_threshold: DEFAULT_RESUME_THRESHOLD,
        }
    }
}
