//! Encoding and decoding limits.
//!
//! The wire format carries no framing beyond record headers, so these bounds
//! are what keep a hostile or truncated stream from driving unbounded
//! recursion or allocation. Encode sessions check the same bounds, so a
//! stream written with [`EncodeOptions`] always decodes under the matching
//! [`DecodeOptions`].

/// Maximum bytes in a varint: 5 head bits + 9 groups of 7 bits covers u64.
pub const MAX_VARINT_BYTES: usize = 10;

/// Default maximum tuple nesting depth. The root tuple is at depth 0.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum byte length of a single buffer or symbol (16 MiB).
pub const MAX_BUFFER_LEN: u64 = 16 * 1024 * 1024;

/// Default maximum entry count declared by a single tuple record.
pub const MAX_TUPLE_ENTRIES: u64 = 1 << 20;

/// Limits applied by a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum tuple nesting depth.
    pub max_depth: usize,
    /// Maximum length of one buffer or symbol payload.
    pub max_buffer_len: u64,
    /// Maximum entry count of one tuple record.
    pub max_tuple_entries: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_buffer_len: MAX_BUFFER_LEN,
            max_tuple_entries: MAX_TUPLE_ENTRIES,
        }
    }
}

impl DecodeOptions {
    /// Creates options with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum buffer length.
    pub fn max_buffer_len(mut self, len: u64) -> Self {
        self.max_buffer_len = len;
        self
    }

    /// Sets the maximum tuple entry count.
    pub fn max_tuple_entries(mut self, count: u64) -> Self {
        self.max_tuple_entries = count;
        self
    }
}

/// Limits applied by an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Maximum tuple nesting depth.
    pub max_depth: usize,
    /// Maximum length of one buffer or symbol payload.
    pub max_buffer_len: u64,
    /// Maximum entry count of one tuple record.
    pub max_tuple_entries: u64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        DecodeOptions::default().into()
    }
}

impl EncodeOptions {
    /// Creates options with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum buffer length.
    pub fn max_buffer_len(mut self, len: u64) -> Self {
        self.max_buffer_len = len;
        self
    }

    /// Sets the maximum tuple entry count.
    pub fn max_tuple_entries(mut self, count: u64) -> Self {
        self.max_tuple_entries = count;
        self
    }
}

impl From<DecodeOptions> for EncodeOptions {
    fn from(options: DecodeOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            max_buffer_len: options.max_buffer_len,
            max_tuple_entries: options.max_tuple_entries,
        }
    }
}

impl From<EncodeOptions> for DecodeOptions {
    fn from(options: EncodeOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            max_buffer_len: options.max_buffer_len,
            max_tuple_entries: options.max_tuple_entries,
        }
    }
}
