//! Error types for tuple space encoding and decoding.
//!
//! Encoding fails only when a graph exceeds the limits a decoder with the
//! same options would enforce. Decoding consumes untrusted bytes and reports
//! every failure to its caller.

use thiserror::Error;

use crate::model::Kind;

/// Classification of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The stream cannot be reconstructed; any partial result must be discarded.
    Fatal,
    /// The stream may be well formed but exceeds a configured decode limit.
    Rejected,
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    // === Malformed input ===
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length ({max} bytes)")]
    VarintTooLong { max: usize },

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    // === Limits ===
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },

    // === Dictionary resolution ===
    #[error("tuple reference {id} was never introduced in this session")]
    DanglingTupleReference { id: u64 },

    #[error("buffer reference {id} was never introduced in this session")]
    DanglingReference { id: u64 },

    #[error("dictionary entry {id} is a {found:?}, expected a {expected:?}")]
    EntryKindMismatch { id: u64, expected: Kind, found: Kind },

    #[error("tuple reference {id} points at a tuple that is still being decoded")]
    CyclicReference { id: u64 },

    // === Journal replay ===
    #[error("journal record {record} addresses a different entity than the first record")]
    ReplayEntityMismatch { record: u64 },
}

impl DecodeError {
    /// Returns how the failure affects the surrounding operation.
    pub fn severity(&self) -> Severity {
        match self {
            DecodeError::LengthExceedsLimit { .. } | DecodeError::DepthExceeded { .. } => {
                Severity::Rejected
            }
            _ => Severity::Fatal,
        }
    }

    /// Returns true if the stream can no longer be interpreted.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Error during binary encoding.
///
/// The session's writer and dictionary are left as they were before the
/// failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("nesting depth exceeds maximum {max}")]
    DepthExceeded { max: usize },
}

/// A non-fatal condition observed while decoding.
///
/// Diagnostics are collected on the session; the decode itself continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A name reference pointed at an id with no dictionary entry. The entry
    /// was stored under a placeholder symbol instead.
    ///
    /// Placeholders are never interned and never equal a real name.
    MissingSymbol { id: u64 },
}
