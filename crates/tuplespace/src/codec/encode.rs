//! Encode sessions.
//!
//! An [`EncodeSession`] walks a value graph and writes records, assigning
//! dictionary ids to tuples and symbols in first-appearance order. Ids are
//! never transmitted for immediates: the decoder re-derives them from the
//! order in which immediates arrive, so the registration order here must
//! match [`DecodeSession`](crate::codec::DecodeSession) exactly.
//!
//! Sessions enforce the same limits a decode session does. A call that
//! fails leaves both the writer and the dictionary untouched, so a journal
//! stays consistent after a rejected record.

use rustc_hash::FxHashMap;

use crate::codec::header::{write_header, Header};
use crate::codec::primitives::Writer;
use crate::error::EncodeError;
use crate::limits::EncodeOptions;
use crate::model::{Buffer, Kind, ObjectKey, Symbol, Tuple, Value};

/// Object identity to id table for one encode session.
#[derive(Debug, Clone, Default)]
pub struct EncodeDictionary {
    ids: FxHashMap<ObjectKey, u64>,
    assigned: u64,
    // Registrations made by the current call, with the id each key had before.
    undo: Vec<(ObjectKey, Option<u64>)>,
}

impl EncodeDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id assigned to `key`.
    pub fn lookup(&self, key: ObjectKey) -> Option<u64> {
        self.ids.get(&key).copied()
    }

    /// Assigns the next sequential id to `key`.
    ///
    /// Re-registering an object gives it a new id; the decoder does the same
    /// when the object is spelled out again, so both sides stay in step.
    pub fn register(&mut self, key: ObjectKey) -> u64 {
        self.assigned += 1;
        let previous = self.ids.insert(key, self.assigned);
        self.undo.push((key, previous));
        self.assigned
    }

    /// Returns the number of ids assigned so far.
    pub fn len(&self) -> u64 {
        self.assigned
    }

    /// Returns true if no ids have been assigned.
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    fn checkpoint(&mut self) -> u64 {
        self.undo.clear();
        self.assigned
    }

    fn rollback(&mut self, assigned: u64) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(id) => {
                    self.ids.insert(key, id);
                }
                None => {
                    self.ids.remove(&key);
                }
            }
        }
        self.assigned = assigned;
    }
}

/// Encoder state for one logical unit of work.
///
/// For a snapshot, use a fresh session per root. For a journal, keep one
/// session alive across calls so later records can reference entities
/// introduced by earlier ones.
#[derive(Debug, Clone, Default)]
pub struct EncodeSession {
    dictionary: EncodeDictionary,
    options: EncodeOptions,
}

impl EncodeSession {
    /// Creates a session with an empty dictionary and default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with an empty dictionary and the given limits.
    pub fn with_options(options: EncodeOptions) -> Self {
        Self {
            dictionary: EncodeDictionary::new(),
            options,
        }
    }

    /// Creates a session continuing from an existing dictionary.
    pub fn with_dictionary(dictionary: EncodeDictionary, options: EncodeOptions) -> Self {
        Self { dictionary, options }
    }

    /// Returns the session dictionary.
    pub fn dictionary(&self) -> &EncodeDictionary {
        &self.dictionary
    }

    /// Returns the session limits.
    pub fn options(&self) -> EncodeOptions {
        self.options
    }

    /// Consumes the session, returning its dictionary.
    pub fn into_dictionary(self) -> EncodeDictionary {
        self.dictionary
    }

    /// Writes `tuple` in full and registers it.
    ///
    /// Nested tuples already seen in this session are written as references.
    /// The tuple is registered before its entries are visited, so a tuple
    /// that contains itself is written as a back-reference, not recursed into.
    pub fn encode_tuple(&mut self, writer: &mut Writer, tuple: &Tuple) -> Result<(), EncodeError> {
        self.atomically(writer, |session, writer| session.tuple_at(writer, tuple, 0))
    }

    /// Writes a symbol, by reference if it was already written in this session.
    pub fn encode_symbol(&mut self, writer: &mut Writer, symbol: &Symbol) -> Result<(), EncodeError> {
        self.atomically(writer, |session, writer| session.symbol(writer, symbol))
    }

    /// Writes a value record.
    ///
    /// Buffers are always literal. A tuple already registered in this
    /// session is written as a reference carrying no entries.
    pub fn encode_value(&mut self, writer: &mut Writer, value: &Value) -> Result<(), EncodeError> {
        self.atomically(writer, |session, writer| session.value_at(writer, value, 0))
    }

    /// Writes one entity/attribute/value mutation.
    ///
    /// The entity is spelled out (as an otherwise empty tuple) the first time
    /// it is seen in this session and referenced by id afterwards, so repeated
    /// updates to the same entity cost a few bytes of framing each.
    pub fn encode_eav(
        &mut self,
        writer: &mut Writer,
        entity: &Tuple,
        attribute: &Symbol,
        value: &Value,
    ) -> Result<(), EncodeError> {
        self.encode_entity(writer, entity, std::slice::from_ref(&(attribute.clone(), value.clone())))
    }

    /// Writes several attribute/value mutations against one entity as a
    /// single record.
    pub fn encode_entity(
        &mut self,
        writer: &mut Writer,
        entity: &Tuple,
        attributes: &[(Symbol, Value)],
    ) -> Result<(), EncodeError> {
        self.atomically(writer, |session, writer| {
            let count = attributes.len() as u64;
            session.check_tuple(0, count)?;
            match session.dictionary.lookup(entity.key()) {
                Some(id) => write_tuple_reference(writer, id, count),
                None => {
                    write_header(writer, Header::immediate(Kind::Tuple, count));
                    session.dictionary.register(entity.key());
                }
            }
            for (name, value) in attributes {
                session.symbol(writer, name)?;
                session.value_at(writer, value, 1)?;
            }
            Ok(())
        })
    }

    fn atomically<F>(&mut self, writer: &mut Writer, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self, &mut Writer) -> Result<(), EncodeError>,
    {
        let start = writer.len();
        let assigned = self.dictionary.checkpoint();
        let result = f(self, writer);
        if result.is_err() {
            writer.truncate(start);
            self.dictionary.rollback(assigned);
        }
        result
    }

    fn tuple_at(&mut self, writer: &mut Writer, tuple: &Tuple, depth: usize) -> Result<(), EncodeError> {
        let entries = tuple.entries();
        self.check_tuple(depth, entries.len() as u64)?;
        write_header(writer, Header::immediate(Kind::Tuple, entries.len() as u64));
        self.dictionary.register(tuple.key());
        for (name, value) in &entries {
            self.symbol(writer, name)?;
            self.value_at(writer, value, depth + 1)?;
        }
        Ok(())
    }

    fn symbol(&mut self, writer: &mut Writer, symbol: &Symbol) -> Result<(), EncodeError> {
        if let Some(id) = self.dictionary.lookup(symbol.key()) {
            write_header(writer, Header::reference(Kind::Buffer, id));
            return Ok(());
        }
        self.check_len("name", symbol.len())?;
        write_header(writer, Header::immediate(Kind::Buffer, symbol.len() as u64));
        writer.write_bytes(symbol.as_bytes());
        self.dictionary.register(symbol.key());
        Ok(())
    }

    fn value_at(&mut self, writer: &mut Writer, value: &Value, depth: usize) -> Result<(), EncodeError> {
        match value {
            Value::Tuple(tuple) => match self.dictionary.lookup(tuple.key()) {
                Some(id) => {
                    self.check_tuple(depth, 0)?;
                    write_tuple_reference(writer, id, 0);
                    Ok(())
                }
                None => self.tuple_at(writer, tuple, depth),
            },
            Value::Buffer(buffer) => {
                self.check_len("buffer", buffer.len())?;
                encode_buffer(writer, buffer);
                Ok(())
            }
        }
    }

    fn check_tuple(&self, depth: usize, count: u64) -> Result<(), EncodeError> {
        if depth >= self.options.max_depth {
            return Err(EncodeError::DepthExceeded {
                max: self.options.max_depth,
            });
        }
        if count > self.options.max_tuple_entries {
            return Err(EncodeError::LengthExceedsLimit {
                field: "tuple",
                len: count,
                max: self.options.max_tuple_entries,
            });
        }
        Ok(())
    }

    fn check_len(&self, field: &'static str, len: usize) -> Result<(), EncodeError> {
        let len = len as u64;
        if len > self.options.max_buffer_len {
            return Err(EncodeError::LengthExceedsLimit {
                field,
                len,
                max: self.options.max_buffer_len,
            });
        }
        Ok(())
    }
}

/// Tuple reference: header carrying the count of entries that follow, then
/// the id as a standalone varint.
fn write_tuple_reference(writer: &mut Writer, id: u64, count: u64) {
    write_header(writer, Header::reference(Kind::Tuple, count));
    writer.write_varint(id);
}

fn encode_buffer(writer: &mut Writer, buffer: &Buffer) {
    write_header(writer, Header::immediate(Kind::Buffer, buffer.len() as u64));
    writer.write_bytes(buffer.as_bytes());
}

/// Encodes `tuple` with a fresh session and default limits.
pub fn encode_tuple(tuple: &Tuple) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    EncodeSession::new().encode_tuple(&mut writer, tuple)?;
    Ok(writer.into_bytes())
}

/// Encodes `value` with a fresh session and default limits.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    EncodeSession::new().encode_value(&mut writer, value)?;
    Ok(writer.into_bytes())
}
