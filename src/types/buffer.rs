//! Reference-counted bytecode buffer and a forward-only cursor over it.

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use std::ops::Deref;
use std::sync::Arc;

/// A growable, reference-counted byte buffer.
///
/// Cloning is cheap and shares storage; `append` copies on write when the
/// storage is shared, so a clone taken before an append never observes it.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct ByteBuffer(Arc<Vec<u8>>);

impl ByteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with the specified capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self(Arc::new(Vec::with_capacity(cap)))
    }

    /// Returns the number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the buffer contents as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Copies the buffer contents into a new `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Appends bytes to the end of the buffer. Appending nothing is a no-op.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        Arc::make_mut(&mut self.0).extend_from_slice(bytes);
    }

    /// Returns a cursor positioned at offset 0.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.as_slice())
    }
}

impl Clone for ByteBuffer {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl Encode for ByteBuffer {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.len().encode(out);
        out.write(self.as_slice());
    }
}

impl Decode for ByteBuffer {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Vec::<u8>::decode(input).map(ByteBuffer::from)
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(v: Vec<u8>) -> Self {
        Self(Arc::new(v))
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(s: &[u8]) -> Self {
        Self::from(s.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for ByteBuffer {
    fn from(arr: [u8; N]) -> Self {
        Self::from(arr.to_vec())
    }
}

/// Forward-only read position over a byte slice.
///
/// The offset never exceeds the slice length. Reads that would run past the
/// end return `None` and leave the offset unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// True while the cursor has not reached the end of the buffer.
    pub fn has_data(&self) -> bool {
        self.offset < self.data.len()
    }

    /// Returns the next `size` bytes without advancing.
    pub fn peek(&self, size: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(size)?;
        self.data.get(self.offset..end)
    }

    /// Copies `dst.len()` bytes starting at the offset into `dst`.
    ///
    /// The offset is not advanced; pair with [`Cursor::skip`]. Returns `None`
    /// without copying when fewer bytes remain.
    pub fn read_into(&self, dst: &mut [u8]) -> Option<()> {
        let bytes = self.peek(dst.len())?;
        dst.copy_from_slice(bytes);
        Some(())
    }

    /// Advances by `size` bytes, stopping at the end of the buffer.
    pub fn skip(&mut self, size: usize) {
        self.offset += size.min(self.remaining());
    }
}
