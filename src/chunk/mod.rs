//! Chunk types.
//!
//! - [`Chunk`] - Buffer plus valid length, handed from producer to consumer

mod data;

pub use data::Chunk;
