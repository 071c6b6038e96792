//! Record header encoding/decoding.
//!
//! Every record starts with a header. First byte, most significant bit first:
//!
//! ```text
//!   7        6      5     4..0
//! +------+------+-----+-----------+
//! | form | kind | ext | low bits  |
//! +------+------+-----+-----------+
//! ```
//!
//! `form` is 1 for an immediate record (payload follows) and 0 for a
//! reference; `kind` is 1 for a tuple and 0 for a buffer. Values that do not
//! fit in 5 bits set `ext`: the first byte then holds the highest bits and
//! 7-bit groups follow, most significant first, with the continuation bit set
//! on every group but the last.

use crate::codec::primitives::{groups_for, significant_bits, Reader, Writer};
use crate::error::DecodeError;
use crate::limits::MAX_VARINT_BYTES;
use crate::model::Kind;

const FORM_BIT: u8 = 0x80;
const KIND_BIT: u8 = 0x40;
const EXT_BIT: u8 = 0x20;
const LOW_MASK: u8 = 0x1F;
const LOW_BITS: u32 = 5;

/// Whether a record's payload is spelled out or referenced by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Form {
    /// Payload is a dictionary id assigned earlier in the session.
    Reference = 0,
    /// Payload follows inline.
    Immediate = 1,
}

/// A decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub form: Form,
    pub kind: Kind,
    /// Length for immediates (bytes of a buffer, entries of a tuple); id for
    /// buffer references; entry count for tuple references.
    pub value: u64,
}

impl Header {
    /// Creates an immediate header.
    pub fn immediate(kind: Kind, len: u64) -> Self {
        Self {
            form: Form::Immediate,
            kind,
            value: len,
        }
    }

    /// Creates a reference header.
    pub fn reference(kind: Kind, value: u64) -> Self {
        Self {
            form: Form::Reference,
            kind,
            value,
        }
    }

    /// Returns true for immediate records.
    pub fn is_immediate(&self) -> bool {
        self.form == Form::Immediate
    }
}

/// Number of extension bytes needed after the first byte.
#[inline]
fn extension_groups(value: u64) -> u32 {
    let bits = significant_bits(value);
    if bits > LOW_BITS {
        groups_for(bits - LOW_BITS)
    } else {
        0
    }
}

/// Returns the encoded size of a header carrying `value`.
pub fn header_len(value: u64) -> usize {
    1 + extension_groups(value) as usize
}

/// Writes a header.
pub fn write_header(writer: &mut Writer, header: Header) {
    let groups = extension_groups(header.value);
    let mut first = ((header.form as u8) << 7) | ((header.kind as u8) << 6);
    if groups > 0 {
        first |= EXT_BIT;
    }
    first |= (header.value >> (7 * groups)) as u8 & LOW_MASK;
    writer.write_byte(first);
    if groups > 0 {
        writer.write_groups(header.value, groups);
    }
}

/// Reads a header.
///
/// The decoded value is not checked against the remaining input; callers
/// validate lengths and ids.
pub fn read_header(reader: &mut Reader<'_>) -> Result<Header, DecodeError> {
    let first = reader.read_byte("header")?;
    let form = if first & FORM_BIT != 0 {
        Form::Immediate
    } else {
        Form::Reference
    };
    let kind = Kind::from_bit((first & KIND_BIT) >> 6);
    let mut value = u64::from(first & LOW_MASK);
    if first & EXT_BIT != 0 {
        value = reader.read_continuation(value, MAX_VARINT_BYTES - 1, "header extension")?;
    }
    Ok(Header { form, kind, value })
}
