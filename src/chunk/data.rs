//! The Chunk type - a filled buffer travelling from producer to consumer.

use std::fmt;

/// A buffer holding bytes read from the source, ready to be written once.
///
/// Only the first `len()` bytes are valid. Anything past them is stale data
/// from an earlier use of the buffer and is never exposed.
///
/// # Example
///
/// ```
/// use pipecopy::Chunk;
///
/// let mut buffer = vec![0u8; 16];
/// buffer[..5].copy_from_slice(b"hello");
/// let chunk = Chunk::new(buffer, 5, 0);
///
/// assert_eq!(chunk.as_slice(), b"hello");
/// assert_eq!(chunk.end(), 5);
/// let buffer = chunk.into_buffer();
/// assert_eq!(buffer.len(), 16);
/// ```
#[derive(Debug)]
pub struct Chunk {
    buffer: Vec<u8>,
    len: usize,
    offset: u64,
}

impl Chunk {
    /// Wraps `buffer` with `len` valid bytes that started at `offset` in the
    /// source stream.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the buffer length.
    pub fn new(buffer: Vec<u8>, len: usize, offset: u64) -> Self {
        assert!(
            len <= buffer.len(),
            "chunk length {} exceeds buffer length {}",
            len,
            buffer.len()
        );
        Self {
            buffer,
            len,
            offset,
        }
    }

    /// Returns the valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Returns the number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the chunk holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the length of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the source offset of the first valid byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the end offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }

    /// Consumes the chunk and returns the backing buffer.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk({} of {} bytes @ {})",
            self.len,
            self.buffer.len(),
            self.offset
        )
    }
}
