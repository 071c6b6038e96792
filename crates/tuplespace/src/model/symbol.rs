//! Interned attribute names.
//!
//! A [`Symbol`] is a canonical handle for a name: interning the same text
//! twice yields the same handle, and equality is identity equality. Tuples use
//! symbols exclusively as keys, and the codec shares their id space with
//! tuples.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::model::ObjectKey;

/// An interned, identity-comparable name.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolInner>);

struct SymbolInner {
    key: ObjectKey,
    text: Arc<[u8]>,
}

impl Symbol {
    /// Interns `text` in the process-wide symbol table.
    pub fn intern(text: impl AsRef<[u8]>) -> Symbol {
        intern(text)
    }

    /// Creates a symbol that belongs to no table. It is equal only to its
    /// own clones, whatever its text.
    pub(crate) fn detached(text: impl AsRef<[u8]>) -> Symbol {
        Symbol(Arc::new(SymbolInner {
            key: ObjectKey::next(),
            text: Arc::from(text.as_ref()),
        }))
    }

    /// Returns the stable identity of this symbol.
    pub fn key(&self) -> ObjectKey {
        self.0.key
    }

    /// Returns the raw text of the symbol.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0.text
    }

    /// Returns the text as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0.text).ok()
    }

    /// Returns the text length in bytes.
    pub fn len(&self) -> usize {
        self.0.text.len()
    }

    /// Returns true if the symbol names the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.text.is_empty()
    }

    /// Returns the shared storage backing the text.
    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.0.text)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", String::from_utf8_lossy(&self.0.text))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0.text))
    }
}

/// Interning service mapping text to canonical [`Symbol`] handles.
///
/// Symbols are never evicted, so a symbol's identity stays valid for as long
/// as any handle to it exists.
#[derive(Default)]
pub struct SymbolTable {
    symbols: FxHashMap<Box<[u8]>, Symbol>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical symbol for `text`, creating it on first use.
    pub fn intern(&mut self, text: &[u8]) -> Symbol {
        if let Some(symbol) = self.symbols.get(text) {
            return symbol.clone();
        }
        let symbol = Symbol(Arc::new(SymbolInner {
            key: ObjectKey::next(),
            text: Arc::from(text),
        }));
        self.symbols.insert(text.into(), symbol.clone());
        symbol
    }

    /// Returns the symbol for `text` if it has already been interned.
    pub fn get(&self, text: &[u8]) -> Option<Symbol> {
        self.symbols.get(text).cloned()
    }

    /// Returns the number of interned symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.symbols.len())
            .finish()
    }
}

lazy_static! {
    static ref GLOBAL_SYMBOLS: Mutex<SymbolTable> = Mutex::new(SymbolTable::new());
}

/// Interns `text` in the process-wide symbol table.
///
/// Decode sessions intern through this table, so names read from any stream
/// compare identity-equal with names interned directly by callers.
pub fn intern(text: impl AsRef<[u8]>) -> Symbol {
    GLOBAL_SYMBOLS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .intern(text.as_ref())
}

/// Returns the process-wide symbol for `text` without interning it.
pub fn lookup(text: impl AsRef<[u8]>) -> Option<Symbol> {
    GLOBAL_SYMBOLS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(text.as_ref())
}
