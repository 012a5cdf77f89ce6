//! Growable in-memory byte buffer with an explicit write cursor.
//!
//! Supports the reserve-then-fill discipline the encoder needs: reserve a
//! placeholder for a length header, serialize a payload of unknown size
//! after it, then backpatch the header in place.

/// Append-mostly byte buffer backing both codec directions.
///
/// Writes go at the end; `drain_front` consumes from the start and retains
/// the unread tail, which is how the encoder carries excess bytes into the
/// next chunk and the decoder carries a partial Record into the next pull.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append bytes at the write cursor.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Reserve `n` placeholder bytes at the write cursor and return their
    /// offset for a later `patch`.
    pub fn reserve_gap(&mut self, n: usize) -> usize {
        let offset = self.data.len();
        self.data.resize(offset + n, 0);
        offset
    }

    /// Overwrite previously written (or reserved) bytes in place.
    ///
    /// # Panics
    /// Panics if `offset + bytes.len()` exceeds the buffer length; the
    /// caller only patches gaps it reserved.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// View the buffered bytes without consuming them.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Remove and return the first `n` bytes, retaining the tail.
    ///
    /// `n` is clamped to the buffer length.
    pub fn drain_front(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.data.len());
        let tail = self.data.split_off(n);
        std::mem::replace(&mut self.data, tail)
    }
}
