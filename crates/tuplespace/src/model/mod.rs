//! Data model for the tuple space.
//!
//! This module contains the object graph that the codec serializes:
//! - Symbols (interned attribute names)
//! - Buffers (immutable byte leaves)
//! - Tuples (insertion-ordered Symbol to Value maps)
//! - Builders and path resolution over nested tuples

pub mod builder;
pub mod symbol;
pub mod tuple;
pub mod value;

use std::sync::atomic::{AtomicU64, Ordering};

pub use builder::TupleBuilder;
pub use symbol::{intern, lookup, Symbol, SymbolTable};
pub use tuple::{resolve_path, DebugTuple, Tuple, TupleHandler};
pub use value::{Buffer, Kind, Value};

static NEXT_OBJECT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a dictionary-eligible object (tuple or symbol).
///
/// Keys are drawn from one counter and never reused, so two live objects
/// never share a key and a dropped object's key is never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(u64);

impl ObjectKey {
    pub(crate) fn next() -> Self {
        ObjectKey(NEXT_OBJECT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw key value.
    pub fn get(self) -> u64 {
        self.0
    }
}
