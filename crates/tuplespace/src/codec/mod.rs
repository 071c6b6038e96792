//! Binary encoding/decoding for the tuple space.
//!
//! Every record is framed by a [`header`]. Encode and decode sessions assign
//! dictionary ids to tuples and symbols in stream order, so later records can
//! reference earlier objects by id instead of repeating them.

pub mod decode;
pub mod encode;
pub mod header;
pub mod journal;
pub mod primitives;

pub use decode::{decode_value, DecodeDictionary, DecodeSession, DictionaryEntry};
pub use encode::{encode_tuple, encode_value, EncodeDictionary, EncodeSession};
pub use header::{header_len, read_header, write_header, Form, Header};
pub use journal::{JournalReader, JournalWriter};
pub use primitives::{varint_len, Reader, Writer};
