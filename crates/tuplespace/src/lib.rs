//! Tuple space: a schema-less object graph and its self-describing binary codec.
//!
//! The tuple space is the canonical representation for boot manifests,
//! process configuration and filesystem metadata. Its graph has two node
//! kinds: tuples (insertion-ordered maps from interned symbols to values)
//! and buffers (immutable bytes).
//!
//! # Quick Start
//!
//! ```rust
//! use tuplespace::{decode_value, encode_tuple, intern, TupleBuilder};
//!
//! let manifest = TupleBuilder::new()
//!     .buffer("program", "/bin/init")
//!     .child("environment", |env| env.buffer("HOME", "/"))
//!     .build();
//!
//! let bytes = encode_tuple(&manifest).unwrap();
//! let decoded = decode_value(&bytes).unwrap();
//!
//! let program = decoded.as_tuple().unwrap().get(&intern("program")).unwrap();
//! assert_eq!(program.as_buffer().unwrap().as_bytes(), b"/bin/init");
//! ```
//!
//! # Journals
//!
//! Sessions can outlive a single call. An [`EncodeSession`] kept across
//! entity/attribute/value writes turns its dictionary into a running log:
//! each entity is spelled out once, then referenced by id.
//!
//! ```rust
//! use tuplespace::{intern, JournalReader, JournalWriter, Tuple, Value};
//!
//! let inode = Tuple::new();
//! let mut journal = JournalWriter::new();
//! journal.record(&inode, &intern("size"), &Value::from("0")).unwrap();
//! journal.record(&inode, &intern("size"), &Value::from("4096")).unwrap();
//!
//! let state = Tuple::new();
//! JournalReader::new().replay(journal.as_bytes(), &state).unwrap();
//! assert_eq!(state.get(&intern("size")), Some(Value::from("4096")));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Symbols, buffers, tuples, builders, path resolution
//! - [`codec`]: Header codec, encode/decode sessions, journals
//! - [`error`]: Error and diagnostic types
//! - [`limits`]: Encode and decode limits for untrusted input
//!
//! # Wire Format
//!
//! There is no magic number, checksum or stream length; framing of whole
//! messages belongs to the transport or storage layer that embeds the codec.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;

// Re-export commonly used types at crate root
pub use codec::{
    decode_value, encode_tuple, encode_value, DecodeSession, EncodeSession, JournalReader,
    JournalWriter, Reader, Writer,
};
pub use error::{DecodeError, Diagnostic, EncodeError, Severity};
pub use limits::{DecodeOptions, EncodeOptions};
pub use model::{
    intern, resolve_path, Buffer, DebugTuple, Kind, Symbol, Tuple, TupleBuilder, TupleHandler,
    Value,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
