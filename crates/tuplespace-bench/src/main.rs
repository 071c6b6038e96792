//! Benchmark for tuple space serialization using filesystem metadata.
//!
//! Builds a boot manifest with a synthetic filesystem tree (or loads a JSON
//! manifest given on the command line), then measures snapshot encoding,
//! decoding, and an EAV journal of metadata updates against the same tree.

use std::fs;
use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tuplespace::{
    encode_tuple, intern, resolve_path, DecodeSession, JournalReader, JournalWriter, Reader, Tuple,
    TupleBuilder, Value,
};
use uuid::Uuid;

const DIRECTORIES: usize = 64;
const FILES_PER_DIRECTORY: usize = 256;
const JOURNAL_UPDATES: usize = 100_000;

// =============================================================================
// MANIFEST CONSTRUCTION
// =============================================================================

/// Converts a JSON document into a tuple graph.
///
/// Objects become tuples, arrays become tuples keyed by index, and scalars
/// become buffers holding their textual form.
fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Object(map) => {
            let t = Tuple::new();
            for (k, v) in map {
                t.set(intern(k), json_to_value(v));
            }
            Value::Tuple(t)
        }
        serde_json::Value::Array(items) => {
            let t = Tuple::new();
            for (i, v) in items.iter().enumerate() {
                t.set(intern(i.to_string()), json_to_value(v));
            }
            Value::Tuple(t)
        }
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Null => Value::from(Vec::<u8>::new()),
        other => Value::from(other.to_string()),
    }
}

/// Builds a manifest whose filesystem has `DIRECTORIES * FILES_PER_DIRECTORY`
/// files. Files share a handful of permission tuples, which the encoder
/// writes once and references afterwards.
fn synthetic_manifest() -> (Tuple, Vec<Tuple>) {
    let modes: Vec<Tuple> = ["0644", "0755", "0600"]
        .iter()
        .map(|m| TupleBuilder::new().buffer("mode", *m).buffer("uid", "0").build())
        .collect();

    let mut files = Vec::with_capacity(DIRECTORIES * FILES_PER_DIRECTORY);
    let children = Tuple::new();
    for d in 0..DIRECTORIES {
        let dir = Tuple::new();
        for f in 0..FILES_PER_DIRECTORY {
            let file = TupleBuilder::new()
                .buffer("id", Uuid::new_v4().to_string())
                .buffer("size", (f * 512).to_string())
                .tuple("permissions", &modes[f % modes.len()])
                .buffer("extents", vec![(f % 251) as u8; 16])
                .build();
            dir.set(intern(format!("file{f}")), file.clone());
            files.push(file);
        }
        children.set(intern(format!("dir{d}")), dir);
    }

    let root = TupleBuilder::new()
        .buffer("program", "/dir0/file0")
        .child("environment", |e| e.buffer("HOME", "/").buffer("PATH", "/bin"))
        .tuple("children", &children)
        .build();
    (root, files)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (root, files) = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading manifest from: {}", path);
            let text = fs::read_to_string(&path).expect("Failed to read manifest");
            let json: serde_json::Value = serde_json::from_str(&text).expect("Failed to parse JSON");
            match json_to_value(&json) {
                Value::Tuple(t) => (t, Vec::new()),
                Value::Buffer(_) => panic!("manifest root must be a JSON object"),
            }
        }
        None => {
            println!(
                "Building synthetic manifest: {} directories x {} files",
                DIRECTORIES, FILES_PER_DIRECTORY
            );
            synthetic_manifest()
        }
    };

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------
    let encode_start = Instant::now();
    let bytes = encode_tuple(&root).expect("Failed to encode snapshot");
    let encode_time = encode_start.elapsed();
    println!("\n=== Snapshot ===");
    println!("Encoded {} bytes in {:?}", bytes.len(), encode_time);

    let decode_start = Instant::now();
    let mut session = DecodeSession::new();
    let decoded = session
        .decode_value(&mut Reader::new(&bytes))
        .expect("Failed to decode snapshot");
    let decode_time = decode_start.elapsed();
    println!(
        "Decoded {} dictionary entries in {:?}",
        session.dictionary().len(),
        decode_time
    );
    assert!(
        decoded.structurally_eq(&Value::Tuple(root.clone())),
        "snapshot round trip mismatch"
    );

    let decoded_root = decoded.as_tuple().expect("root is a tuple");
    if let Some(Value::Buffer(program)) = decoded_root.get(&intern("program")) {
        let path = String::from_utf8_lossy(program.as_bytes()).into_owned();
        let found = resolve_path(decoded_root, &format!("/children{path}"));
        println!("Program {} resolves: {}", path, found.is_some());
    }

    if files.is_empty() {
        return;
    }

    // -------------------------------------------------------------------------
    // Journal
    // -------------------------------------------------------------------------
    let mut journal = JournalWriter::new();
    journal.snapshot(&root).expect("Failed to journal snapshot");
    let snapshot_len = journal.len();

    let size = intern("size");
    let mut expected: Vec<Option<usize>> = vec![None; files.len()];
    let journal_start = Instant::now();
    for i in 0..JOURNAL_UPDATES {
        let index = (i * 7919) % files.len();
        journal
            .record(&files[index], &size, &Value::from((i * 4096).to_string()))
            .expect("Failed to journal update");
        expected[index] = Some(i * 4096);
    }
    let journal_time = journal_start.elapsed();
    let update_bytes = journal.len() - snapshot_len;
    println!("\n=== Journal ===");
    println!(
        "Appended {} updates ({} bytes, {:.2} bytes/update) in {:?}",
        JOURNAL_UPDATES,
        update_bytes,
        update_bytes as f64 / JOURNAL_UPDATES as f64,
        journal_time
    );

    let apply_start = Instant::now();
    let mut reader = JournalReader::new();
    let values = reader
        .apply(journal.as_bytes())
        .expect("Failed to apply journal");
    println!("Applied {} records in {:?}", values.len(), apply_start.elapsed());

    let journal_root = values[0].as_tuple().expect("snapshot record is a tuple");
    let mut checked = 0;
    for (index, last) in expected.iter().enumerate() {
        let Some(last) = last else { continue };
        let path = format!(
            "/children/dir{}/file{}/size",
            index / FILES_PER_DIRECTORY,
            index % FILES_PER_DIRECTORY
        );
        assert_eq!(
            resolve_path(journal_root, &path),
            Some(Value::from(last.to_string())),
            "journal state mismatch at {path}"
        );
        checked += 1;
    }
    println!("Verified {} updated files", checked);

    info!(
        records = reader.records(),
        dictionary = reader.session().dictionary().len(),
        "journal apply complete"
    );

    println!("\n=== Summary ===");
    println!("Files: {}", files.len());
    println!(
        "Snapshot: {} bytes ({:.1} bytes/file)",
        bytes.len(),
        bytes.len() as f64 / files.len() as f64
    );
    println!("Journal:  {} bytes total", journal.len());
}
