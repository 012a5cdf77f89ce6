//! Citadel Stream
//!
//! Artifact streaming/framing protocol for the Citadel client SDK:
//! - Serializing an ordered sequence of opaque binary artifacts into a
//!   bounded-size stream of wire chunks (`ArtifactEncoder`)
//! - Reassembling the artifacts losslessly and in order on the receiving
//!   side, independent of chunk boundaries (`ArtifactDecoder`)
//! - The growable byte buffer both directions share (`ByteBuffer`)
//!
//! Each artifact travels as a Record: an 8-byte little-endian length prefix
//! followed by exactly that many payload bytes. Chunks are carved from the
//! Record concatenation in stream order; Record boundaries need not align
//! with chunk boundaries.

pub mod buffer;
pub mod decode;
pub mod encode;
pub mod error;

pub use buffer::ByteBuffer;
pub use decode::ArtifactDecoder;
pub use encode::ArtifactEncoder;
pub use error::{StreamError, StreamResult};

/// Byte width of the little-endian Record length prefix.
pub const LEN_PREFIX_BYTES: usize = 8;

/// Default upper bound on the size of one wire chunk, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000_000;
