//! Primitive encoding/decoding for the tuple space wire format.
//!
//! Implements the byte cursor, the growable output buffer and the
//! big-endian base-128 varint used for standalone ids.

use crate::error::DecodeError;
use crate::limits::MAX_VARINT_BYTES;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and advances a cursor; every read is bounds-checked.
/// Bytes are never re-read once consumed.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the byte `offset` bytes past the cursor without consuming it.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos.checked_add(offset)?).copied()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a standalone big-endian base-128 varint.
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        self.read_continuation(0, MAX_VARINT_BYTES, context)
    }

    /// Continues a big-endian base-128 value: for each byte, shifts the
    /// accumulator left 7 and ORs in the low 7 bits, stopping after the first
    /// byte with the continuation bit clear.
    pub(crate) fn read_continuation(
        &mut self,
        mut acc: u64,
        max_bytes: usize,
        context: &'static str,
    ) -> Result<u64, DecodeError> {
        for _ in 0..max_bytes {
            let byte = self.read_byte(context)?;
            if acc >> 57 != 0 {
                return Err(DecodeError::VarintOverflow);
            }
            acc = (acc << 7) | u64::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(acc);
            }
        }
        Err(DecodeError::VarintTooLong {
            max: MAX_VARINT_BYTES,
        })
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Removes and returns everything written so far.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards everything written after the first `len` bytes.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a standalone big-endian base-128 varint.
    #[inline]
    pub fn write_varint(&mut self, value: u64) {
        let groups = groups_for(significant_bits(value)).max(1);
        self.write_groups(value, groups);
    }

    /// Writes the low `groups * 7` bits of `value` as 7-bit groups, most
    /// significant first, with the continuation bit on all but the last.
    pub(crate) fn write_groups(&mut self, value: u64, groups: u32) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let groups = groups as usize;
        for (i, slot) in buf[..groups].iter_mut().enumerate() {
            let shift = 7 * (groups - 1 - i);
            let mut byte = ((value >> shift) & 0x7F) as u8;
            if i + 1 < groups {
                byte |= 0x80;
            }
            *slot = byte;
        }
        self.buf.extend_from_slice(&buf[..groups]);
    }
}

/// Number of bits needed to represent `value` (0 for 0).
#[inline]
pub(crate) fn significant_bits(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Number of 7-bit groups needed for `bits` bits.
#[inline]
pub(crate) fn groups_for(bits: u32) -> u32 {
    bits.div_ceil(7)
}

/// Returns the encoded size of a standalone varint.
pub fn varint_len(value: u64) -> usize {
    groups_for(significant_bits(value)).max(1) as usize
}
