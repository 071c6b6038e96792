//! Values stored in tuples.
//!
//! A [`Value`] is either a composite [`Tuple`] or a leaf [`Buffer`]. There is
//! no other variant, so every codec branch point matches exhaustively.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::model::{ObjectKey, Symbol, Tuple};

/// Wire kind of a record (header bit 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// Byte payload: a buffer value or a symbol name.
    Buffer = 0,
    /// Composite tuple.
    Tuple = 1,
}

impl Kind {
    /// Creates a Kind from its header bit.
    pub fn from_bit(bit: u8) -> Kind {
        if bit & 1 == 1 { Kind::Tuple } else { Kind::Buffer }
    }
}

/// Immutable byte payload.
///
/// Cloning shares the underlying storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Buffer(Arc<[u8]>);

impl Buffer {
    /// Returns the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the bytes as UTF-8, if valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if both buffers share the same storage.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer(bytes.into())
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Buffer(bytes.into())
    }
}

impl<const N: usize> From<&[u8; N]> for Buffer {
    fn from(bytes: &[u8; N]) -> Self {
        Buffer(bytes.as_slice().into())
    }
}

impl From<&str> for Buffer {
    fn from(text: &str) -> Self {
        Buffer(text.as_bytes().into())
    }
}

impl From<String> for Buffer {
    fn from(text: String) -> Self {
        Buffer(text.into_bytes().into())
    }
}

/// A buffer viewing a symbol's text, sharing its storage.
impl From<&Symbol> for Buffer {
    fn from(symbol: &Symbol) -> Self {
        Buffer(symbol.shared_bytes())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "Buffer({text:?})"),
            None => write!(f, "Buffer({:02x?})", &self.0[..]),
        }
    }
}

/// A node in the tuple space graph.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// Composite, shareable node.
    Tuple(Tuple),
    /// Byte leaf.
    Buffer(Buffer),
}

impl Value {
    /// Returns the wire kind of this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Tuple(_) => Kind::Tuple,
            Value::Buffer(_) => Kind::Buffer,
        }
    }

    /// Returns the tuple, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            Value::Buffer(_) => None,
        }
    }

    /// Returns the buffer, if this is a buffer.
    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Value::Buffer(b) => Some(b),
            Value::Tuple(_) => None,
        }
    }

    /// Compares two graphs by structure: same keys (by symbol identity), same
    /// nesting, same buffer bytes. Entry order is not significant.
    ///
    /// Shared and self-referencing tuples are handled: a pair of tuples
    /// already under comparison is assumed equal.
    pub fn structurally_eq(&self, other: &Value) -> bool {
        let mut seen = FxHashSet::default();
        values_eq(self, other, &mut seen)
    }
}

impl From<Tuple> for Value {
    fn from(t: Tuple) -> Self {
        Value::Tuple(t)
    }
}

impl From<Buffer> for Value {
    fn from(b: Buffer) -> Self {
        Value::Buffer(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Buffer(text.into())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Buffer(text.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Buffer(bytes.into())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Tuple(t) => fmt::Debug::fmt(t, f),
            Value::Buffer(b) => fmt::Debug::fmt(b, f),
        }
    }
}

pub(crate) fn values_eq(
    a: &Value,
    b: &Value,
    seen: &mut FxHashSet<(ObjectKey, ObjectKey)>,
) -> bool {
    match (a, b) {
        (Value::Buffer(x), Value::Buffer(y)) => x == y,
        (Value::Tuple(x), Value::Tuple(y)) => tuples_eq(x, y, seen),
        _ => false,
    }
}

pub(crate) fn tuples_eq(a: &Tuple, b: &Tuple, seen: &mut FxHashSet<(ObjectKey, ObjectKey)>) -> bool {
    if a.ptr_eq(b) || !seen.insert((a.key(), b.key())) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.entries().iter().all(|(name, value)| {
        b.get(name)
            .is_some_and(|other| values_eq(value, &other, seen))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::intern;

    #[test]
    fn test_kind() {
        assert_eq!(Value::from("x").kind(), Kind::Buffer);
        assert_eq!(Value::from(Tuple::new()).kind(), Kind::Tuple);
        assert_eq!(Kind::from_bit(1), Kind::Tuple);
        assert_eq!(Kind::from_bit(0), Kind::Buffer);
    }

    #[test]
    fn test_buffer_from_symbol_shares_storage() {
        let s = intern("contents");
        let a = Buffer::from(&s);
        let b = Buffer::from(&s);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.as_bytes(), b"contents");
        assert_eq!(a, Buffer::from("contents"));
    }

    #[test]
    fn test_structural_eq_ignores_order() {
        let a = Tuple::new();
        a.set(intern("x"), "1");
        a.set(intern("y"), "2");
        let b = Tuple::new();
        b.set(intern("y"), "2");
        b.set(intern("x"), "1");
        assert_eq!(Value::from(a.clone()), Value::from(b.clone()));

        b.set(intern("x"), "3");
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_structural_eq_kind_mismatch() {
        let a = Tuple::new();
        a.set(intern("x"), Tuple::new());
        let b = Tuple::new();
        b.set(intern("x"), "");
        assert!(!Value::from(a).structurally_eq(&Value::from(b)));
    }

    #[test]
    fn test_structural_eq_self_reference() {
        let a = Tuple::new();
        a.set(intern("self"), a.clone());
        let b = Tuple::new();
        b.set(intern("self"), b.clone());
        assert!(Value::from(a.clone()).structurally_eq(&Value::from(b.clone())));
        a.remove(&intern("self"));
        b.remove(&intern("self"));
    }

    #[test]
    fn test_buffer_debug() {
        assert_eq!(format!("{:?}", Buffer::from("hi")), "Buffer(\"hi\")");
        assert_eq!(format!("{:?}", Buffer::from(vec![0xffu8])), "Buffer([ff])");
    }
}
