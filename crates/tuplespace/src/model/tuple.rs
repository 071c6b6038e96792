//! Tuples: the graph's only composite node.
//!
//! A [`Tuple`] is a shared handle to an insertion-ordered map from [`Symbol`]
//! to [`Value`]. Cloning the handle shares the tuple; the codec relies on the
//! tuple's [`ObjectKey`] to recognize repeated occurrences of the same object.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::value::tuples_eq;
use crate::model::{lookup, ObjectKey, Symbol, Value};

/// Shared, mutable, insertion-ordered Symbol to Value map.
#[derive(Clone)]
pub struct Tuple(Rc<TupleInner>);

struct TupleInner {
    key: ObjectKey,
    entries: RefCell<Entries>,
}

#[derive(Default)]
struct Entries {
    items: Vec<(Symbol, Value)>,
    index: FxHashMap<Symbol, usize>,
}

impl Tuple {
    /// Creates a new empty tuple with a fresh identity.
    pub fn new() -> Self {
        Tuple(Rc::new(TupleInner {
            key: ObjectKey::next(),
            entries: RefCell::new(Entries::default()),
        }))
    }

    /// Returns the stable identity of this tuple.
    pub fn key(&self) -> ObjectKey {
        self.0.key
    }

    /// Returns true if both handles refer to the same tuple.
    pub fn ptr_eq(&self, other: &Tuple) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the value stored under `name`.
    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let entries = self.0.entries.borrow();
        entries.index.get(name).map(|&i| entries.items[i].1.clone())
    }

    /// Returns true if an entry exists under `name`.
    pub fn contains(&self, name: &Symbol) -> bool {
        self.0.entries.borrow().index.contains_key(name)
    }

    /// Stores `value` under `name`, returning the previous value.
    ///
    /// Overwriting keeps the entry at its original position.
    pub fn set(&self, name: Symbol, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        let mut entries = self.0.entries.borrow_mut();
        if let Some(&i) = entries.index.get(&name) {
            return Some(std::mem::replace(&mut entries.items[i].1, value));
        }
        let i = entries.items.len();
        entries.items.push((name.clone(), value));
        entries.index.insert(name, i);
        None
    }

    /// Removes the entry under `name`, returning its value.
    pub fn remove(&self, name: &Symbol) -> Option<Value> {
        let mut entries = self.0.entries.borrow_mut();
        let i = entries.index.remove(name)?;
        let (_, value) = entries.items.remove(i);
        for slot in entries.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.entries.borrow().items.len()
    }

    /// Returns true if the tuple has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().items.is_empty()
    }

    /// Returns a snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(Symbol, Value)> {
        self.0.entries.borrow().items.clone()
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> Vec<Symbol> {
        self.0
            .entries
            .borrow()
            .items
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Sets every entry of `other` into this tuple; entries of `other` win.
    pub fn merge_from(&self, other: &Tuple) {
        for (name, value) in other.entries() {
            self.set(name, value);
        }
    }
}

impl Default for Tuple {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality; see [`Value::structurally_eq`].
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        tuples_eq(self, other, &mut FxHashSet::default())
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = RefCell::new(FxHashSet::default());
        fmt::Debug::fmt(&GraphDebug { tuple: self, open: &open }, f)
    }
}

/// Debug view that prints a tuple graph, eliding tuples already being printed.
struct GraphDebug<'a> {
    tuple: &'a Tuple,
    open: &'a RefCell<FxHashSet<ObjectKey>>,
}

impl fmt::Debug for GraphDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.tuple.key();
        if !self.open.borrow_mut().insert(key) {
            return write!(f, "<cycle #{}>", key.get());
        }
        let mut map = f.debug_map();
        for (name, value) in self.tuple.entries() {
            match &value {
                Value::Tuple(t) => map.entry(&name, &GraphDebug { tuple: t, open: self.open }),
                Value::Buffer(b) => map.entry(&name, b),
            };
        }
        let result = map.finish();
        self.open.borrow_mut().remove(&key);
        result
    }
}

/// Abstract read/write/iterate interface over a tuple.
///
/// Lets callers interpose on tuple access (logging, access control,
/// computed attributes) without the codec knowing about it.
pub trait TupleHandler {
    /// Returns the value stored under `name`.
    fn get(&self, name: &Symbol) -> Option<Value>;

    /// Stores `value` under `name`, returning the previous value.
    fn set(&self, name: Symbol, value: Value) -> Option<Value>;

    /// Visits every entry in insertion order.
    fn iterate(&self, each: &mut dyn FnMut(&Symbol, &Value));
}

impl TupleHandler for Tuple {
    fn get(&self, name: &Symbol) -> Option<Value> {
        Tuple::get(self, name)
    }

    fn set(&self, name: Symbol, value: Value) -> Option<Value> {
        Tuple::set(self, name, value)
    }

    fn iterate(&self, each: &mut dyn FnMut(&Symbol, &Value)) {
        for (name, value) in self.entries() {
            each(&name, &value);
        }
    }
}

/// A [`TupleHandler`] that logs every access before forwarding it.
#[derive(Debug, Clone)]
pub struct DebugTuple<H> {
    label: String,
    inner: H,
}

impl<H: TupleHandler> DebugTuple<H> {
    /// Wraps `inner`, tagging log lines with `label`.
    pub fn new(label: impl Into<String>, inner: H) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }

    /// Returns the wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Unwraps the handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: TupleHandler> TupleHandler for DebugTuple<H> {
    fn get(&self, name: &Symbol) -> Option<Value> {
        let value = self.inner.get(name);
        tracing::debug!(
            target: "tuplespace::tuple",
            tuple = %self.label,
            name = %name,
            found = value.is_some(),
            "get"
        );
        value
    }

    fn set(&self, name: Symbol, value: Value) -> Option<Value> {
        tracing::debug!(
            target: "tuplespace::tuple",
            tuple = %self.label,
            name = %name,
            kind = ?value.kind(),
            "set"
        );
        self.inner.set(name, value)
    }

    fn iterate(&self, each: &mut dyn FnMut(&Symbol, &Value)) {
        tracing::debug!(target: "tuplespace::tuple", tuple = %self.label, "iterate");
        self.inner.iterate(each)
    }
}

/// Resolves a `/`-separated path through nested tuples.
///
/// Empty components are skipped, so `"/bin/init"` and `"bin/init"` are the
/// same path and `""` resolves to `root` itself. Returns `None` if a
/// component is missing or a buffer is reached before the last component.
pub fn resolve_path(root: &Tuple, path: &str) -> Option<Value> {
    let mut current = Value::Tuple(root.clone());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        let tuple = current.as_tuple()?;
        // A name that was never interned cannot be a key anywhere.
        let name = lookup(component)?;
        current = tuple.get(&name)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{intern, Buffer};

    #[test]
    fn test_set_get_overwrite() {
        let t = Tuple::new();
        assert!(t.is_empty());
        assert!(t.set(intern("a"), "1").is_none());
        assert!(t.set(intern("b"), "2").is_none());
        let prev = t.set(intern("a"), "3");
        assert_eq!(prev, Some(Value::from("1")));
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&intern("a")), Some(Value::from("3")));
        // Overwrite keeps the original position.
        assert_eq!(t.keys(), vec![intern("a"), intern("b")]);
    }

    #[test]
    fn test_remove_reindexes() {
        let t = Tuple::new();
        t.set(intern("a"), "1");
        t.set(intern("b"), "2");
        t.set(intern("c"), "3");
        assert_eq!(t.remove(&intern("a")), Some(Value::from("1")));
        assert!(t.remove(&intern("a")).is_none());
        assert!(!t.contains(&intern("a")));
        assert_eq!(t.get(&intern("c")), Some(Value::from("3")));
        t.set(intern("b"), "4");
        assert_eq!(t.keys(), vec![intern("b"), intern("c")]);
        assert_eq!(t.get(&intern("b")), Some(Value::from("4")));
    }

    #[test]
    fn test_identity_vs_structure() {
        let a = Tuple::new();
        let b = Tuple::new();
        assert_ne!(a.key(), b.key());
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        let a2 = a.clone();
        assert!(a.ptr_eq(&a2));
        assert_eq!(a.key(), a2.key());
    }

    #[test]
    fn test_merge_from() {
        let a = Tuple::new();
        a.set(intern("x"), "1");
        a.set(intern("y"), "2");
        let b = Tuple::new();
        b.set(intern("x"), "3");
        b.set(intern("z"), "4");
        a.merge_from(&b);
        assert_eq!(a.keys(), vec![intern("x"), intern("y"), intern("z")]);
        assert_eq!(a.get(&intern("x")), Some(Value::from("3")));
    }

    #[test]
    fn test_resolve_path() {
        let init = Tuple::new();
        init.set(intern("contents"), Buffer::from(vec![0x7f, b'E', b'L', b'F']));
        let bin = Tuple::new();
        bin.set(intern("init"), init.clone());
        let root = Tuple::new();
        root.set(intern("bin"), bin);
        root.set(intern("program"), "/bin/init");

        let found = resolve_path(&root, "/bin/init").unwrap();
        assert!(found.as_tuple().unwrap().ptr_eq(&init));
        assert!(resolve_path(&root, "bin//init/").is_some());
        assert!(resolve_path(&root, "").unwrap().as_tuple().unwrap().ptr_eq(&root));
        assert!(resolve_path(&root, "/bin/missing").is_none());
        assert!(resolve_path(&root, "/bin/never-interned-component-zz").is_none());
        // Cannot descend through a buffer.
        assert!(resolve_path(&root, "/program/x").is_none());
    }

    #[test]
    fn test_debug_tuple_forwards() {
        let inner = Tuple::new();
        let wrapped = DebugTuple::new("root", inner.clone());
        assert!(TupleHandler::set(&wrapped, intern("k"), Value::from("v")).is_none());
        assert_eq!(TupleHandler::get(&wrapped, &intern("k")), Some(Value::from("v")));
        assert_eq!(inner.get(&intern("k")), Some(Value::from("v")));

        let mut seen = Vec::new();
        wrapped.iterate(&mut |name, _| seen.push(name.clone()));
        assert_eq!(seen, vec![intern("k")]);
        assert!(wrapped.into_inner().ptr_eq(&inner));
    }

    #[test]
    fn test_debug_format_handles_cycles() {
        let t = Tuple::new();
        t.set(intern("name"), "root");
        t.set(intern("parent"), t.clone());
        let text = format!("{:?}", t);
        assert!(text.contains("<cycle #"));
        assert!(text.contains("\"root\""));
        t.remove(&intern("parent"));
    }
}
