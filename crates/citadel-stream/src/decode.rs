//! Artifact Decoder: in-order chunks in, reconstructed artifacts out.

use crate::buffer::ByteBuffer;
use crate::error::{StreamError, StreamResult};
use crate::LEN_PREFIX_BYTES;

enum DecodeState {
    /// Waiting for the 8-byte length prefix of the next Record.
    Header,
    /// Waiting for the declared number of payload bytes.
    Payload(usize),
}

/// Pull-based decoder re-delimiting artifact boundaries from a chunk stream.
///
/// The input must be the in-order, gap-free, non-duplicated chunk sequence
/// produced by [`crate::ArtifactEncoder`]; reliable delivery is the
/// transport's contract. Length prefixes and payloads may span any number of
/// chunk boundaries. One artifact is emitted per completed Record, in the
/// original order.
///
/// The decoder never trusts the sender at end of stream: a Record whose
/// declared length cannot be satisfied by the remaining bytes, or a stream
/// that ends inside a length prefix, is a framing error rather than a
/// silently truncated artifact. `max_record_len` optionally rejects absurd
/// declared lengths up front so a corrupt header cannot force unbounded
/// buffering.
///
/// Errors raised by the chunk source propagate unchanged; any error ends
/// the stream.
pub struct ArtifactDecoder<I, F> {
    source: Option<I>,
    deserialize: F,
    buffer: ByteBuffer,
    state: DecodeState,
    max_record_len: Option<u64>,
    poisoned: bool,
}

impl<T, I, F> ArtifactDecoder<I, F>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
    F: FnMut(&[u8]) -> StreamResult<T>,
{
    /// Create a decoder over `source` with the given deserializer.
    pub fn new(source: I, deserialize: F) -> Self {
        Self {
            source: Some(source),
            deserialize,
            buffer: ByteBuffer::new(),
            state: DecodeState::Header,
            max_record_len: None,
            poisoned: false,
        }
    }

    /// Reject any Record declaring more than `limit` payload bytes.
    #[must_use]
    pub fn with_max_record_len(mut self, limit: u64) -> Self {
        self.max_record_len = Some(limit);
        self
    }

    /// Buffer the next chunk. Returns `Ok(true)` if bytes may have arrived,
    /// `Ok(false)` if the source is exhausted.
    fn pull(&mut self) -> StreamResult<bool> {
        match self.source.as_mut().and_then(Iterator::next) {
            Some(Ok(bytes)) => {
                self.buffer.extend_from_slice(&bytes);
                Ok(true)
            }
            Some(Err(e)) => Err(e),
            None => {
                self.source = None;
                Ok(false)
            }
        }
    }

    fn read_header(&mut self) -> StreamResult<usize> {
        let mut header = [0u8; LEN_PREFIX_BYTES];
        header.copy_from_slice(&self.buffer.drain_front(LEN_PREFIX_BYTES));
        let declared = u64::from_le_bytes(header);
        if let Some(limit) = self.max_record_len {
            if declared > limit {
                return Err(StreamError::Framing(format!(
                    "record declares {declared} payload bytes, limit is {limit}"
                )));
            }
        }
        usize::try_from(declared).map_err(|_| {
            StreamError::Framing(format!("record length {declared} does not fit in memory"))
        })
    }
}

impl<T, I, F> Iterator for ArtifactDecoder<I, F>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
    F: FnMut(&[u8]) -> StreamResult<T>,
{
    type Item = StreamResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }

        loop {
            match self.state {
                DecodeState::Header => {
                    if self.buffer.len() >= LEN_PREFIX_BYTES {
                        match self.read_header() {
                            Ok(size) => self.state = DecodeState::Payload(size),
                            Err(e) => {
                                self.poisoned = true;
                                return Some(Err(e));
                            }
                        }
                        continue;
                    }
                    match self.pull() {
                        Ok(true) => {}
                        Ok(false) => {
                            if self.buffer.is_empty() {
                                // Clean end on a Record boundary.
                                return None;
                            }
                            self.poisoned = true;
                            return Some(Err(StreamError::Framing(format!(
                                "stream ended inside a record header ({} of {} bytes)",
                                self.buffer.len(),
                                LEN_PREFIX_BYTES
                            ))));
                        }
                        Err(e) => {
                            self.poisoned = true;
                            return Some(Err(e));
                        }
                    }
                }
                DecodeState::Payload(size) => {
                    if self.buffer.len() >= size {
                        let payload = self.buffer.drain_front(size);
                        self.state = DecodeState::Header;
                        let artifact = (self.deserialize)(&payload);
                        if artifact.is_err() {
                            self.poisoned = true;
                        }
                        return Some(artifact);
                    }
                    match self.pull() {
                        Ok(true) => {}
                        Ok(false) => {
                            self.poisoned = true;
                            return Some(Err(StreamError::Framing(format!(
                                "record declares {size} payload bytes, stream ended with {}",
                                self.buffer.len()
                            ))));
                        }
                        Err(e) => {
                            self.poisoned = true;
                            return Some(Err(e));
                        }
                    }
                }
            }
        }
    }
}

/// Deserializer adapter for artifacts consumed as raw bytes.
pub fn read_bytes(payload: &[u8]) -> StreamResult<Vec<u8>> {
    Ok(payload.to_vec())
}
