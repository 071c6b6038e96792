//! Entity/attribute/value journals.
//!
//! A journal is a stream of EAV records written by one long-lived
//! [`EncodeSession`]. Because the dictionary outlives each record, an entity
//! is spelled out once and referenced by id in every later mutation. The
//! reading side keeps one [`DecodeSession`] alive for the same reason, and
//! can consume the journal in segments as they are flushed to storage.

use tracing::trace;

use crate::codec::decode::DecodeSession;
use crate::codec::encode::EncodeSession;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{DecodeOptions, EncodeOptions};
use crate::model::{Symbol, Tuple, TupleHandler, Value};

/// Appends EAV records to an in-memory journal.
#[derive(Debug, Default)]
pub struct JournalWriter {
    session: EncodeSession,
    writer: Writer,
    records: u64,
}

impl JournalWriter {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty journal that refuses records exceeding `options`.
    pub fn with_options(options: EncodeOptions) -> Self {
        Self {
            session: EncodeSession::with_options(options),
            ..Self::default()
        }
    }

    /// Writes `root` in full, so later records can reference it and every
    /// tuple reachable from it by id.
    pub fn snapshot(&mut self, root: &Tuple) -> Result<(), EncodeError> {
        self.session.encode_tuple(&mut self.writer, root)?;
        self.records += 1;
        trace!(target: "tuplespace::journal", bytes = self.writer.len(), "snapshot");
        Ok(())
    }

    /// Appends one `entity.attribute = value` mutation.
    ///
    /// A rejected mutation leaves the journal unchanged.
    pub fn record(&mut self, entity: &Tuple, attribute: &Symbol, value: &Value) -> Result<(), EncodeError> {
        let before = self.writer.len();
        self.session.encode_eav(&mut self.writer, entity, attribute, value)?;
        self.records += 1;
        trace!(
            target: "tuplespace::journal",
            attribute = %attribute,
            bytes = self.writer.len() - before,
            "record"
        );
        Ok(())
    }

    /// Appends several mutations of one entity as a single record.
    pub fn record_entity(&mut self, entity: &Tuple, attributes: &[(Symbol, Value)]) -> Result<(), EncodeError> {
        self.session.encode_entity(&mut self.writer, entity, attributes)?;
        self.records += 1;
        Ok(())
    }

    /// Returns the number of records appended.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Returns the number of unflushed bytes.
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    /// Returns true if there are no unflushed bytes.
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    /// Returns the unflushed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    /// Removes and returns the unflushed bytes as a segment. The dictionary
    /// is kept, so the next segment continues to reference earlier entities.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.writer.take_bytes()
    }

    /// Returns the encode session.
    pub fn session(&self) -> &EncodeSession {
        &self.session
    }
}

/// Applies journal segments with one persistent decode session.
#[derive(Debug, Default)]
pub struct JournalReader {
    session: DecodeSession,
    records: u64,
    // Entity followed by `replay`, fixed by the first replayed record.
    replay_entity: Option<Tuple>,
}

impl JournalReader {
    /// Creates a reader with an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader with the given limits.
    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            session: DecodeSession::with_options(options),
            ..Self::default()
        }
    }

    /// Creates a reader continuing an existing decode session, keeping its
    /// dictionary and limits.
    pub fn resume(session: DecodeSession) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    /// Decodes every record in `segment`, returning the entity each record
    /// touched.
    pub fn apply(&mut self, segment: &[u8]) -> Result<Vec<Value>, DecodeError> {
        let mut reader = Reader::new(segment);
        let values = self.session.decode_all(&mut reader)?;
        self.records += values.len() as u64;
        trace!(target: "tuplespace::journal", records = values.len(), "apply");
        Ok(values)
    }

    /// Decodes every record in `segment` and merges each mutation into
    /// `target` in stream order. Returns the number of records applied.
    ///
    /// Replay follows a single entity: every record, across all segments
    /// replayed by this reader, must address the entity the first record
    /// introduced or referenced. Journals that mix entities, or that start
    /// with a snapshot of a larger graph, are consumed with
    /// [`apply`](Self::apply) instead.
    pub fn replay<H: TupleHandler>(&mut self, segment: &[u8], target: &H) -> Result<usize, DecodeError> {
        let mut reader = Reader::new(segment);
        let mut applied = 0;
        while !reader.is_empty() {
            self.session
                .replay_record(&mut reader, &mut self.replay_entity, self.records, target)?;
            self.records += 1;
            applied += 1;
        }
        trace!(target: "tuplespace::journal", records = applied, "replay");
        Ok(applied)
    }

    /// Returns the number of records decoded.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Returns the decode session.
    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    /// Consumes the reader, returning its session.
    pub fn into_session(self) -> DecodeSession {
        self.session
    }
}
