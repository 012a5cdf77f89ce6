//! Artifact Encoder: artifacts in, bounded-size chunks out.

use crate::buffer::ByteBuffer;
use crate::error::{StreamError, StreamResult};
use crate::LEN_PREFIX_BYTES;

/// Pull-based encoder turning a lazy artifact sequence into a lazy chunk
/// sequence.
///
/// Each artifact is framed as a Record: an 8-byte little-endian length
/// prefix reserved up front, the serialized payload written after it, and
/// the true payload length backpatched once serialization completes. Chunks
/// of exactly `chunk_size` bytes are emitted as soon as the buffer holds
/// enough; any excess seeds the next chunk. When the source is exhausted the
/// remainder is emitted as a final, possibly shorter (or empty) chunk, so
/// every stream yields at least one chunk.
///
/// A single artifact larger than `chunk_size` simply spans several chunks;
/// the decoder tolerates Records split at arbitrary chunk boundaries.
///
/// Serialization failure is fatal: the error is yielded once and the stream
/// terminates with no partial recovery.
pub struct ArtifactEncoder<I, F> {
    source: Option<I>,
    serialize: F,
    chunk_size: usize,
    buffer: ByteBuffer,
    poisoned: bool,
    finished: bool,
}

impl<T, I, F> ArtifactEncoder<I, F>
where
    I: Iterator<Item = T>,
    F: FnMut(&T, &mut ByteBuffer) -> StreamResult<()>,
{
    /// Create an encoder over `source` with the given serializer and chunk
    /// size bound.
    ///
    /// # Panics
    /// Panics if `chunk_size` is zero; callers validate configured sizes.
    pub fn new(source: I, serialize: F, chunk_size: usize) -> Self {
        assert!(chunk_size >= 1, "chunk size must be positive");
        Self {
            source: Some(source),
            serialize,
            chunk_size,
            buffer: ByteBuffer::new(),
            poisoned: false,
            finished: false,
        }
    }

    /// Frame one artifact into the buffer as a length-prefixed Record.
    fn push_record(&mut self, artifact: &T) -> StreamResult<()> {
        let header = self.buffer.reserve_gap(LEN_PREFIX_BYTES);
        let start = self.buffer.len();
        (self.serialize)(artifact, &mut self.buffer)?;
        let payload_len = (self.buffer.len() - start) as u64;
        self.buffer.patch(header, &payload_len.to_le_bytes());
        Ok(())
    }
}

impl<T, I, F> Iterator for ArtifactEncoder<I, F>
where
    I: Iterator<Item = T>,
    F: FnMut(&T, &mut ByteBuffer) -> StreamResult<()>,
{
    type Item = StreamResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.finished {
            return None;
        }

        while self.buffer.len() < self.chunk_size {
            let Some(source) = self.source.as_mut() else { break };
            match source.next() {
                Some(artifact) => {
                    if let Err(e) = self.push_record(&artifact) {
                        self.poisoned = true;
                        return Some(Err(e));
                    }
                }
                None => {
                    self.source = None;
                    break;
                }
            }
        }

        if self.source.is_none() && self.buffer.len() <= self.chunk_size {
            // Final partial chunk; may be empty when the stream ended
            // exactly on a chunk boundary.
            self.finished = true;
            let remainder = self.buffer.len();
            return Some(Ok(self.buffer.drain_front(remainder)));
        }

        Some(Ok(self.buffer.drain_front(self.chunk_size)))
    }
}

/// Serializer adapter for artifacts that already are raw bytes.
pub fn write_bytes<B: AsRef<[u8]>>(artifact: &B, buffer: &mut ByteBuffer) -> StreamResult<()> {
    buffer.extend_from_slice(artifact.as_ref());
    Ok(())
}
