//! Decode sessions.
//!
//! A [`DecodeSession`] reads records from a [`Reader`], materializing tuples,
//! buffers and symbols. Every immediate tuple or name is registered in the
//! session dictionary at the next sequential id as soon as its header is
//! read, mirroring the order in which the encoder assigned ids. References
//! may only point backwards: an id with no entry is a dangling reference,
//! and a reference to a tuple whose entries are still being read is a cycle.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::codec::header::{read_header, Form, Header};
use crate::codec::primitives::Reader;
use crate::error::{DecodeError, Diagnostic};
use crate::limits::DecodeOptions;
use crate::model::{intern, Buffer, Kind, Symbol, Tuple, TupleHandler, Value};

/// An object materialized by a decode session.
#[derive(Debug, Clone, PartialEq)]
pub enum DictionaryEntry {
    Tuple(Tuple),
    Symbol(Symbol),
}

impl DictionaryEntry {
    /// Returns the wire kind the entry is referenced as.
    pub fn kind(&self) -> Kind {
        match self {
            DictionaryEntry::Tuple(_) => Kind::Tuple,
            DictionaryEntry::Symbol(_) => Kind::Buffer,
        }
    }
}

/// Id to object table for one decode session. Id `n` lives at index `n - 1`.
#[derive(Debug, Clone, Default)]
pub struct DecodeDictionary {
    entries: Vec<DictionaryEntry>,
}

impl DecodeDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `id`.
    pub fn get(&self, id: u64) -> Option<&DictionaryEntry> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Registers `entry` at the next sequential id and returns that id.
    pub fn register(&mut self, entry: DictionaryEntry) -> u64 {
        self.entries.push(entry);
        self.entries.len() as u64
    }

    /// Returns the id the next registered entry will receive.
    pub fn next_id(&self) -> u64 {
        self.entries.len() as u64 + 1
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decoder state for one logical unit of work.
///
/// Resume a journal by handing the dictionary from the previous session to
/// [`DecodeSession::resume`].
#[derive(Debug, Clone, Default)]
pub struct DecodeSession {
    dictionary: DecodeDictionary,
    options: DecodeOptions,
    diagnostics: Vec<Diagnostic>,
    // Ids of tuples whose entries are being read, outermost first.
    open: Vec<u64>,
    placeholders: FxHashMap<u64, Symbol>,
}

impl DecodeSession {
    /// Creates a session with an empty dictionary and default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with an empty dictionary and the given limits.
    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Creates a session continuing from an existing dictionary, with
    /// default limits.
    pub fn resume(dictionary: DecodeDictionary) -> Self {
        Self::resume_with_options(dictionary, DecodeOptions::default())
    }

    /// Creates a session continuing from an existing dictionary.
    pub fn resume_with_options(dictionary: DecodeDictionary, options: DecodeOptions) -> Self {
        Self {
            dictionary,
            options,
            ..Self::default()
        }
    }

    /// Returns the session limits.
    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Replaces the session limits.
    pub fn set_options(&mut self, options: DecodeOptions) {
        self.options = options;
    }

    /// Returns the session dictionary.
    pub fn dictionary(&self) -> &DecodeDictionary {
        &self.dictionary
    }

    /// Consumes the session, returning its dictionary.
    pub fn into_dictionary(self) -> DecodeDictionary {
        self.dictionary
    }

    /// Returns the non-fatal conditions observed so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Removes and returns the diagnostics observed so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Decodes one record.
    ///
    /// A tuple reference record resolves to the previously decoded tuple and
    /// merges the entries that follow it into that tuple.
    pub fn decode_value(&mut self, reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
        self.open.clear();
        self.decode_at(reader, 0, None)
    }

    /// Decodes records until the reader is exhausted.
    pub fn decode_all(&mut self, reader: &mut Reader<'_>) -> Result<Vec<Value>, DecodeError> {
        let mut values = Vec::new();
        while !reader.is_empty() {
            values.push(self.decode_value(reader)?);
        }
        Ok(values)
    }

    /// Decodes every record in `reader` and merges the entries each record
    /// carries into `target`, in stream order. Returns the number of records
    /// applied.
    ///
    /// Every record must address the same entity as the first one, so a
    /// snapshot record is only accepted when later records update its root.
    /// Records applied before a failure stay applied.
    pub fn replay_into<H: TupleHandler>(
        &mut self,
        reader: &mut Reader<'_>,
        target: &H,
    ) -> Result<usize, DecodeError> {
        let mut entity = None;
        let mut records = 0;
        while !reader.is_empty() {
            self.replay_record(reader, &mut entity, records as u64, target)?;
            records += 1;
        }
        Ok(records)
    }

    /// Decodes one record into `target`. `entity` holds the entity earlier
    /// records addressed, and is set by the first one.
    pub(crate) fn replay_record<H: TupleHandler>(
        &mut self,
        reader: &mut Reader<'_>,
        entity: &mut Option<Tuple>,
        record: u64,
        target: &H,
    ) -> Result<(), DecodeError> {
        let changes = Tuple::new();
        self.open.clear();
        let decoded = match self.decode_at(reader, 0, Some(&changes as &dyn TupleHandler))? {
            Value::Tuple(t) => t,
            Value::Buffer(_) => {
                return Err(DecodeError::MalformedEncoding {
                    context: "journal record is not a tuple",
                });
            }
        };
        match entity {
            Some(expected) => {
                if !expected.ptr_eq(&decoded) {
                    return Err(DecodeError::ReplayEntityMismatch { record });
                }
            }
            None => *entity = Some(decoded),
        }
        for (name, value) in changes.entries() {
            target.set(name, value);
        }
        Ok(())
    }

    fn decode_at(
        &mut self,
        reader: &mut Reader<'_>,
        depth: usize,
        mirror: Option<&dyn TupleHandler>,
    ) -> Result<Value, DecodeError> {
        let header = read_header(reader)?;
        match (header.kind, header.form) {
            (Kind::Tuple, Form::Immediate) => {
                self.check_tuple(header, depth)?;
                let tuple = Tuple::new();
                let id = self.dictionary.register(DictionaryEntry::Tuple(tuple.clone()));
                self.open.push(id);
                self.read_entries(reader, &tuple, header.value, depth, mirror)?;
                self.open.pop();
                Ok(Value::Tuple(tuple))
            }
            (Kind::Tuple, Form::Reference) => {
                self.check_tuple(header, depth)?;
                let id = reader.read_varint("tuple reference")?;
                let tuple = match self.dictionary.get(id) {
                    Some(DictionaryEntry::Tuple(t)) => t.clone(),
                    Some(other) => {
                        return Err(DecodeError::EntryKindMismatch {
                            id,
                            expected: Kind::Tuple,
                            found: other.kind(),
                        });
                    }
                    None => return Err(DecodeError::DanglingTupleReference { id }),
                };
                if self.open.contains(&id) {
                    return Err(DecodeError::CyclicReference { id });
                }
                self.open.push(id);
                self.read_entries(reader, &tuple, header.value, depth, mirror)?;
                self.open.pop();
                Ok(Value::Tuple(tuple))
            }
            (Kind::Buffer, Form::Immediate) => {
                let bytes = self.read_payload(reader, header.value, "buffer")?;
                Ok(Value::Buffer(Buffer::from(bytes)))
            }
            (Kind::Buffer, Form::Reference) => {
                let id = header.value;
                match self.dictionary.get(id) {
                    Some(DictionaryEntry::Symbol(s)) => Ok(Value::Buffer(Buffer::from(s))),
                    Some(other) => Err(DecodeError::EntryKindMismatch {
                        id,
                        expected: Kind::Buffer,
                        found: other.kind(),
                    }),
                    None => Err(DecodeError::DanglingReference { id }),
                }
            }
        }
    }

    fn check_tuple(&self, header: Header, depth: usize) -> Result<(), DecodeError> {
        if depth >= self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                max: self.options.max_depth,
            });
        }
        if header.value > self.options.max_tuple_entries {
            return Err(DecodeError::LengthExceedsLimit {
                field: "tuple",
                len: header.value,
                max: self.options.max_tuple_entries,
            });
        }
        Ok(())
    }

    fn read_entries(
        &mut self,
        reader: &mut Reader<'_>,
        tuple: &Tuple,
        count: u64,
        depth: usize,
        mirror: Option<&dyn TupleHandler>,
    ) -> Result<(), DecodeError> {
        for _ in 0..count {
            let name = self.read_name(reader)?;
            let value = self.decode_at(reader, depth + 1, None)?;
            if let Some(target) = mirror {
                target.set(name.clone(), value.clone());
            }
            // Merge: an existing entry under the same name is overwritten.
            tuple.set(name, value);
        }
        Ok(())
    }

    fn read_name(&mut self, reader: &mut Reader<'_>) -> Result<Symbol, DecodeError> {
        let header = read_header(reader)?;
        if header.kind != Kind::Buffer {
            return Err(DecodeError::MalformedEncoding {
                context: "tuple record in name position",
            });
        }
        if header.is_immediate() {
            let bytes = self.read_payload(reader, header.value, "name")?;
            let symbol = intern(bytes);
            self.dictionary.register(DictionaryEntry::Symbol(symbol.clone()));
            return Ok(symbol);
        }
        let id = header.value;
        match self.dictionary.get(id) {
            Some(DictionaryEntry::Symbol(s)) => Ok(s.clone()),
            Some(other) => Err(DecodeError::EntryKindMismatch {
                id,
                expected: Kind::Buffer,
                found: other.kind(),
            }),
            None => {
                warn!(target: "tuplespace::decode", id, "missing decode dictionary symbol");
                self.diagnostics.push(Diagnostic::MissingSymbol { id });
                let placeholder = self
                    .placeholders
                    .entry(id)
                    .or_insert_with(|| Symbol::detached(format!("?{id}")));
                Ok(placeholder.clone())
            }
        }
    }

    fn read_payload<'a>(
        &self,
        reader: &mut Reader<'a>,
        len: u64,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        if len > self.options.max_buffer_len {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: self.options.max_buffer_len,
            });
        }
        let len = usize::try_from(len).map_err(|_| DecodeError::UnexpectedEof { context: field })?;
        reader.read_bytes(len, field)
    }
}

/// Decodes one value from `input` with a fresh session.
pub fn decode_value(input: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader::new(input);
    DecodeSession::new().decode_value(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode::{encode_tuple, EncodeSession};
    use crate::codec::header::write_header;
    use crate::codec::primitives::Writer;
    use crate::error::EncodeError;
    use crate::model::TupleBuilder;
    use proptest::prelude::*;

    fn manifest() -> Tuple {
        TupleBuilder::new()
            .buffer("program", "/bin/init")
            .child("environment", |e| e.buffer("HOME", "/").buffer("USER", "root"))
            .child("children", |c| {
                c.child("bin", |b| {
                    b.child("init", |i| i.buffer("contents", vec![0x7f, b'E', b'L', b'F']))
                })
            })
            .build()
    }

    #[test]
    fn test_roundtrip_no_sharing() {
        let root = manifest();
        let bytes = encode_tuple(&root).unwrap();
        let decoded = decode_value(&bytes).unwrap();
        assert!(decoded.structurally_eq(&Value::Tuple(root.clone())));
        // Insertion order survives the trip.
        assert_eq!(decoded.as_tuple().unwrap().keys(), root.keys());
    }

    #[test]
    fn test_roundtrip_empty_tuple() {
        let bytes = encode_tuple(&Tuple::new()).unwrap();
        assert_eq!(bytes, vec![0xC0]);
        let decoded = decode_value(&bytes).unwrap();
        assert!(decoded.as_tuple().unwrap().is_empty());
    }

    #[test]
    fn test_dictionary_ids_match_encoder() {
        let root = manifest();
        let mut encoder = EncodeSession::new();
        let mut writer = Writer::new();
        encoder.encode_tuple(&mut writer, &root).unwrap();

        let mut decoder = DecodeSession::new();
        let mut reader = Reader::new(writer.as_bytes());
        decoder.decode_value(&mut reader).unwrap();

        assert_eq!(decoder.dictionary().len() as u64, encoder.dictionary().len());
        for name in ["program", "environment", "HOME", "USER", "children", "bin", "init", "contents"] {
            let symbol = intern(name);
            let id = encoder.dictionary().lookup(symbol.key()).unwrap();
            assert_eq!(
                decoder.dictionary().get(id),
                Some(&DictionaryEntry::Symbol(symbol)),
                "id {} for {}",
                id,
                name
            );
        }
    }

    #[test]
    fn test_shared_tuple_decodes_to_shared_handle() {
        let shared = TupleBuilder::new().buffer("mode", "0644").build();
        let root = TupleBuilder::new()
            .tuple("a", &shared)
            .tuple("b", &shared)
            .build();
        let decoded = decode_value(&encode_tuple(&root).unwrap()).unwrap();
        let decoded = decoded.as_tuple().unwrap();
        let a = decoded.get(&intern("a")).unwrap();
        let b = decoded.get(&intern("b")).unwrap();
        assert!(a.as_tuple().unwrap().ptr_eq(b.as_tuple().unwrap()));
        assert_eq!(a, Value::Tuple(shared));
    }

    #[test]
    fn test_dangling_tuple_reference_fails() {
        let mut writer = Writer::new();
        write_header(&mut writer, Header::reference(Kind::Tuple, 1));
        writer.write_varint(1);
        writer.write_bytes(&[0x81, b'x', 0x81, b'y']);

        let mut session = DecodeSession::new();
        let mut reader = Reader::new(writer.as_bytes());
        let err = session.decode_value(&mut reader).unwrap_err();
        assert_eq!(err, DecodeError::DanglingTupleReference { id: 1 });
        assert!(err.is_fatal());
        assert!(session.dictionary().is_empty());
    }

    #[test]
    fn test_missing_symbol_is_degraded() {
        // Tuple with one entry whose name references id 9.
        let data = [0xC1, 0x09, 0x81, b'v'];
        let mut session = DecodeSession::new();
        let mut reader = Reader::new(&data);
        let value = session.decode_value(&mut reader).unwrap();
        let tuple = value.as_tuple().unwrap();
        let keys = tuple.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].as_bytes(), b"?9");
        assert_eq!(tuple.get(&keys[0]), Some(Value::from("v")));
        assert_eq!(session.diagnostics(), &[Diagnostic::MissingSymbol { id: 9 }]);
        assert_eq!(session.take_diagnostics().len(), 1);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_placeholder_never_collides_with_real_name() {
        // {"?9": "a", <missing 9>: "b", <missing 9>: "c"}
        let data = [
            0xC3, 0x82, b'?', b'9', 0x81, b'a', 0x09, 0x81, b'b', 0x09, 0x81, b'c',
        ];
        let mut session = DecodeSession::new();
        let value = session.decode_value(&mut Reader::new(&data)).unwrap();
        let tuple = value.as_tuple().unwrap();

        // The real attribute keeps its value; both missing references share
        // one placeholder, so the last write wins there.
        assert_eq!(tuple.len(), 2);
        assert_eq!(tuple.get(&intern("?9")), Some(Value::from("a")));
        let placeholder = &tuple.keys()[1];
        assert_ne!(placeholder, &intern("?9"));
        assert_eq!(tuple.get(placeholder), Some(Value::from("c")));
        assert_eq!(session.diagnostics().len(), 2);
    }

    #[test]
    fn test_cyclic_reference_rejected() {
        // {x: <tuple ref id 1, 0 entries>}: id 1 is the tuple being read.
        let data = [0xC1, 0x81, b'x', 0x40, 0x01];
        assert_eq!(
            decode_value(&data).unwrap_err(),
            DecodeError::CyclicReference { id: 1 }
        );

        // Same through a grandchild, as the encoder writes a self-containing graph.
        let outer = Tuple::new();
        let inner = Tuple::new();
        inner.set(intern("up"), outer.clone());
        outer.set(intern("down"), inner.clone());
        let bytes = encode_tuple(&outer).unwrap();
        inner.remove(&intern("up"));
        assert_eq!(
            decode_value(&bytes).unwrap_err(),
            DecodeError::CyclicReference { id: 1 }
        );

        // A later record may reference a finished tuple and merge into it.
        let data = [0xC1, 0x81, b'x', 0x81, b'1', 0x41, 0x01, 0x02, 0x81, b'2'];
        let mut session = DecodeSession::new();
        let values = session.decode_all(&mut Reader::new(&data)).unwrap();
        assert_eq!(
            values[1].as_tuple().unwrap().get(&intern("x")),
            Some(Value::from("2"))
        );
    }

    #[test]
    fn test_resume_keeps_options() {
        let mut writer = Writer::new();
        let mut encoder = EncodeSession::new();
        let e = Tuple::new();
        encoder.encode_eav(&mut writer, &e, &intern("x"), &Value::from("1")).unwrap();
        let seg1 = writer.take_bytes();
        encoder.encode_eav(&mut writer, &e, &intern("x"), &Value::from("12345")).unwrap();
        let seg2 = writer.take_bytes();

        let mut first = DecodeSession::new();
        first.decode_all(&mut Reader::new(&seg1)).unwrap();

        let options = DecodeOptions::new().max_buffer_len(4);
        let mut resumed = DecodeSession::resume_with_options(first.into_dictionary(), options);
        assert_eq!(resumed.options(), options);
        assert_eq!(resumed.dictionary().len(), 2);
        assert!(matches!(
            resumed.decode_all(&mut Reader::new(&seg2)),
            Err(DecodeError::LengthExceedsLimit { field: "buffer", len: 5, max: 4 })
        ));

        assert_eq!(
            DecodeSession::resume(DecodeDictionary::new()).options(),
            DecodeOptions::default()
        );
    }

    fn chain(levels: usize) -> Tuple {
        let root = Tuple::new();
        let mut current = root.clone();
        for _ in 1..levels {
            let next = Tuple::new();
            current.set(intern("child"), next.clone());
            current = next;
        }
        root
    }

    #[test]
    fn test_default_limits_are_symmetric() {
        // Deepest graph the encoder accepts decodes with default options.
        let deep = chain(crate::limits::DEFAULT_MAX_DEPTH);
        let decoded = decode_value(&encode_tuple(&deep).unwrap()).unwrap();
        assert!(decoded.structurally_eq(&Value::Tuple(deep)));
        assert!(matches!(
            encode_tuple(&chain(300)),
            Err(EncodeError::DepthExceeded { max: 256 })
        ));

        let len = crate::limits::MAX_BUFFER_LEN as usize;
        let root = TupleBuilder::new().buffer("contents", vec![0x7fu8; len]).build();
        let decoded = decode_value(&encode_tuple(&root).unwrap()).unwrap();
        let contents = decoded.as_tuple().unwrap().get(&intern("contents")).unwrap();
        assert_eq!(contents.as_buffer().unwrap().len(), len);

        let root = TupleBuilder::new().buffer("contents", vec![0x7fu8; len + 1]).build();
        assert!(matches!(
            encode_tuple(&root),
            Err(EncodeError::LengthExceedsLimit { field: "buffer", .. })
        ));
    }

    #[test]
    fn test_replay_into_rejects_second_entity() {
        let a = Tuple::new();
        let b = Tuple::new();
        let mut writer = Writer::new();
        let mut encoder = EncodeSession::new();
        encoder.encode_eav(&mut writer, &a, &intern("size"), &Value::from("1")).unwrap();
        encoder.encode_eav(&mut writer, &a, &intern("mode"), &Value::from("0644")).unwrap();
        encoder.encode_eav(&mut writer, &b, &intern("size"), &Value::from("2")).unwrap();

        let target = Tuple::new();
        let mut decoder = DecodeSession::new();
        let err = decoder
            .replay_into(&mut Reader::new(writer.as_bytes()), &target)
            .unwrap_err();
        assert_eq!(err, DecodeError::ReplayEntityMismatch { record: 2 });
        // Records for the first entity were applied; the stray one was not.
        assert_eq!(target.len(), 2);
        assert_eq!(target.get(&intern("size")), Some(Value::from("1")));
    }

    #[test]
    fn test_symbols_canonicalized() {
        // {a: {k: "1"}, b: {k: "2"}}: second "k" is a reference.
        let root = TupleBuilder::new()
            .child("a", |t| t.buffer("attr-canon", "1"))
            .child("b", |t| t.buffer("attr-canon", "2"))
            .build();
        let bytes = encode_tuple(&root).unwrap();
        let decoded = decode_value(&bytes).unwrap();
        let decoded = decoded.as_tuple().unwrap();

        let direct = intern("attr-canon");
        for outer in ["a", "b"] {
            let inner = decoded.get(&intern(outer)).unwrap();
            let keys = inner.as_tuple().unwrap().keys();
            assert_eq!(keys.len(), 1);
            assert_eq!(keys[0].key(), direct.key());
        }
    }

    #[test]
    fn test_buffer_reference_resolves_only_to_symbols() {
        // Tuple {x: <buffer ref 2>}: id 2 is the symbol "x" itself.
        let data = [0xC1, 0x81, b'x', 0x02];
        let value = decode_value(&data).unwrap();
        let got = value.as_tuple().unwrap().get(&intern("x")).unwrap();
        assert_eq!(got.as_buffer().unwrap().as_bytes(), b"x");

        // Tuple {x: <buffer ref 1>}: id 1 is the tuple, not a symbol.
        let data = [0xC1, 0x81, b'x', 0x01];
        assert_eq!(
            decode_value(&data).unwrap_err(),
            DecodeError::EntryKindMismatch {
                id: 1,
                expected: Kind::Buffer,
                found: Kind::Tuple
            }
        );

        // Buffer reference with nothing registered.
        assert_eq!(
            decode_value(&[0x05]).unwrap_err(),
            DecodeError::DanglingReference { id: 5 }
        );
    }

    #[test]
    fn test_tuple_reference_to_symbol_rejected() {
        // {x: <tuple ref id 2, 0 entries>}: id 2 is a symbol.
        let data = [0xC1, 0x81, b'x', 0x40, 0x02];
        assert!(matches!(
            decode_value(&data),
            Err(DecodeError::EntryKindMismatch { id: 2, expected: Kind::Tuple, .. })
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let bytes = encode_tuple(&manifest()).unwrap();
        for cut in [1, bytes.len() / 2, bytes.len() - 1] {
            let err = decode_value(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, DecodeError::UnexpectedEof { .. }), "cut {}", cut);
        }
    }

    #[test]
    fn test_limits() {
        let bytes = encode_tuple(&manifest()).unwrap();

        let mut session = DecodeSession::with_options(DecodeOptions::new().max_depth(2));
        let err = session.decode_value(&mut Reader::new(&bytes)).unwrap_err();
        assert_eq!(err, DecodeError::DepthExceeded { max: 2 });

        let mut session = DecodeSession::with_options(DecodeOptions::new().max_buffer_len(3));
        let err = session.decode_value(&mut Reader::new(&bytes)).unwrap_err();
        assert!(matches!(err, DecodeError::LengthExceedsLimit { field: "name", .. }));

        let mut session = DecodeSession::with_options(DecodeOptions::new().max_tuple_entries(2));
        let err = session.decode_value(&mut Reader::new(&bytes)).unwrap_err();
        assert!(matches!(err, DecodeError::LengthExceedsLimit { field: "tuple", len: 3, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_tuple_in_name_position() {
        let data = [0xC1, 0xC0];
        assert!(matches!(
            decode_value(&data),
            Err(DecodeError::MalformedEncoding { .. })
        ));
    }

    #[test]
    fn test_decode_all() {
        let mut session = EncodeSession::new();
        let mut writer = Writer::new();
        let a = manifest();
        session.encode_tuple(&mut writer, &a).unwrap();
        session.encode_value(&mut writer, &Value::from("tail")).unwrap();
        session.encode_value(&mut writer, &Value::Tuple(a.clone())).unwrap();

        let mut decoder = DecodeSession::new();
        let values = decoder.decode_all(&mut Reader::new(writer.as_bytes())).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], Value::from("tail"));
        assert!(values[0].as_tuple().unwrap().ptr_eq(values[2].as_tuple().unwrap()));
    }

    #[derive(Debug, Clone)]
    enum Shape {
        Leaf(Vec<u8>),
        Node(Vec<(String, Shape)>),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        let leaf = proptest::collection::vec(any::<u8>(), 0..48).prop_map(Shape::Leaf);
        leaf.prop_recursive(4, 64, 6, |inner| {
            proptest::collection::vec(("[a-f]{1,3}", inner), 0..6).prop_map(Shape::Node)
        })
    }

    fn build(shape: &Shape) -> Value {
        match shape {
            Shape::Leaf(bytes) => Value::from(bytes.clone()),
            Shape::Node(entries) => {
                let t = Tuple::new();
                for (name, child) in entries {
                    t.set(intern(name), build(child));
                }
                Value::Tuple(t)
            }
        }
    }

    proptest! {
        #[test]
        fn prop_tree_roundtrip(entries in proptest::collection::vec(("[a-f]{1,3}", shape()), 0..8)) {
            let root = match build(&Shape::Node(entries)) {
                Value::Tuple(t) => t,
                Value::Buffer(_) => unreachable!(),
            };
            let bytes = encode_tuple(&root).unwrap();
            let mut session = DecodeSession::new();
            let mut reader = Reader::new(&bytes);
            let decoded = session.decode_value(&mut reader).unwrap();
            prop_assert!(reader.is_empty());
            prop_assert!(decoded.structurally_eq(&Value::Tuple(root)));
            prop_assert!(session.diagnostics().is_empty());
        }
    }

    const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

    #[derive(Debug, Clone)]
    enum Leaf {
        Bytes(Vec<u8>),
        Handle(usize),
    }

    fn leaf() -> impl Strategy<Value = Leaf> {
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Leaf::Bytes),
            (0usize..64).prop_map(Leaf::Handle),
        ]
    }

    fn leaf_value(leaf: &Leaf, handles: &[Tuple]) -> Value {
        match leaf {
            Leaf::Bytes(bytes) => Value::from(bytes.clone()),
            Leaf::Handle(_) if handles.is_empty() => Value::from(Vec::<u8>::new()),
            Leaf::Handle(j) => Value::Tuple(handles[j % handles.len()].clone()),
        }
    }

    /// Node `i` may only point at nodes built before it, so the graph is a
    /// DAG whose shared handles the encoder writes as references.
    fn build_dag(nodes: &[Vec<(usize, Leaf)>]) -> (Tuple, Vec<Tuple>) {
        let mut handles: Vec<Tuple> = Vec::with_capacity(nodes.len());
        for entries in nodes {
            let t = Tuple::new();
            for (name, leaf) in entries {
                t.set(intern(NAMES[name % NAMES.len()]), leaf_value(leaf, &handles));
            }
            handles.push(t);
        }
        let root = Tuple::new();
        for (i, h) in handles.iter().enumerate() {
            root.set(intern(format!("n{i}")), h.clone());
        }
        (root, handles)
    }

    proptest! {
        #[test]
        fn prop_shared_graph_with_journal(
            nodes in proptest::collection::vec(proptest::collection::vec((0usize..5, leaf()), 0..4), 1..8),
            mutations in proptest::collection::vec(
                (0usize..64, proptest::collection::vec((0usize..5, leaf()), 1..3)),
                0..16,
            ),
        ) {
            let (root, handles) = build_dag(&nodes);
            let mut encoder = EncodeSession::new();
            let mut writer = Writer::new();
            encoder.encode_tuple(&mut writer, &root).unwrap();

            for (entity, attributes) in &mutations {
                // Acyclic: an entity only gains references to older nodes.
                let entity_index = entity % handles.len();
                let entity = &handles[entity_index];
                let attributes: Vec<(Symbol, Value)> = attributes
                    .iter()
                    .map(|(name, leaf)| {
                        (intern(NAMES[name % NAMES.len()]), leaf_value(leaf, &handles[..entity_index]))
                    })
                    .collect();
                if let [(name, value)] = attributes.as_slice() {
                    encoder.encode_eav(&mut writer, entity, name, value).unwrap();
                } else {
                    encoder.encode_entity(&mut writer, entity, &attributes).unwrap();
                }
                for (name, value) in attributes {
                    entity.set(name, value);
                }
            }

            let mut decoder = DecodeSession::new();
            let mut reader = Reader::new(writer.as_bytes());
            let values = decoder.decode_all(&mut reader).unwrap();
            prop_assert_eq!(values.len(), 1 + mutations.len());
            prop_assert!(values[0].structurally_eq(&Value::Tuple(root.clone())));
            prop_assert!(decoder.diagnostics().is_empty());
            prop_assert_eq!(decoder.dictionary().len() as u64, encoder.dictionary().len());

            let decoded_root = values[0].as_tuple().unwrap();
            for (i, handle) in handles.iter().enumerate() {
                let id = encoder.dictionary().lookup(handle.key()).unwrap();
                let decoded = decoded_root.get(&intern(format!("n{i}"))).unwrap();
                match decoder.dictionary().get(id) {
                    Some(DictionaryEntry::Tuple(t)) => {
                        prop_assert!(t.ptr_eq(decoded.as_tuple().unwrap()));
                    }
                    other => prop_assert!(false, "id {} for n{} decoded as {:?}", id, i, other),
                }
            }
            for name in NAMES {
                let symbol = intern(name);
                if let Some(id) = encoder.dictionary().lookup(symbol.key()) {
                    prop_assert_eq!(decoder.dictionary().get(id), Some(&DictionaryEntry::Symbol(symbol)));
                }
            }
        }
    }
}
