//! Builder API for ergonomic Tuple construction.
//!
//! # Example
//!
//! ```rust
//! use tuplespace::model::TupleBuilder;
//!
//! let manifest = TupleBuilder::new()
//!     .buffer("program", "/bin/init")
//!     .child("environment", |env| env
//!         .buffer("HOME", "/")
//!         .buffer("PATH", "/bin")
//!     )
//!     .build();
//!
//! assert_eq!(manifest.len(), 2);
//! ```

use crate::model::{intern, Buffer, Tuple, Value};

/// Fluent builder for a [`Tuple`].
#[derive(Debug, Default)]
pub struct TupleBuilder {
    tuple: Tuple,
}

impl TupleBuilder {
    /// Creates a builder for a fresh tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a buffer entry.
    pub fn buffer(self, name: &str, bytes: impl Into<Buffer>) -> Self {
        self.tuple.set(intern(name), Value::Buffer(bytes.into()));
        self
    }

    /// Sets a tuple entry. The tuple is shared, not copied.
    pub fn tuple(self, name: &str, tuple: &Tuple) -> Self {
        self.tuple.set(intern(name), Value::Tuple(tuple.clone()));
        self
    }

    /// Sets an entry to a nested tuple built by `f`.
    pub fn child<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(TupleBuilder) -> TupleBuilder,
    {
        let child = f(TupleBuilder::new()).build();
        self.tuple.set(intern(name), Value::Tuple(child));
        self
    }

    /// Sets an arbitrary value.
    pub fn value(self, name: &str, value: impl Into<Value>) -> Self {
        self.tuple.set(intern(name), value);
        self
    }

    /// Returns the built tuple.
    pub fn build(self) -> Tuple {
        self.tuple
    }
}
