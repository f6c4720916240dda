//! Error types for pipecopy.

use std::fmt;

/// Errors that can end a copy session.
///
/// A closed, drained channel is not an error: [`BoundedChannel::pop`]
/// reports it as `None`.
///
/// [`BoundedChannel::pop`]: crate::BoundedChannel::pop
#[derive(Debug)]
pub enum CopyError {
    /// Reading from the source stream failed.
    SourceUnreadable(std::io::Error),

    /// Writing to (or flushing) the destination stream failed.
    DestinationUnwritable(std::io::Error),

    /// The strategy selector did not name a known engine.
    InvalidStrategy {
        /// The name that was supplied.
        name: String,
    },

    /// Invalid configuration parameter.
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// This side stopped because the other side of the session faulted.
    Cancelled,
}

impl CopyError {
    /// Returns true for [`CopyError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CopyError::Cancelled)
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyError::SourceUnreadable(e) => write!(f, "source unreadable: {}", e),
            CopyError::DestinationUnwritable(e) => write!(f, "destination unwritable: {}", e),
            CopyError::InvalidStrategy { name } => {
                write!(
                    f,
                    "invalid strategy: {:?} (expected one of: segmented, bulk, pooled)",
                    name
                )
            }
            CopyError::InvalidConfig { message } => {
                write!(f, "invalid config: {}", message)
            }
            CopyError::Cancelled => write!(f, "copy cancelled by peer fault"),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CopyError::SourceUnreadable(e) | CopyError::DestinationUnwritable(e) => Some(e),
            _ => None,
        }
    }
}
