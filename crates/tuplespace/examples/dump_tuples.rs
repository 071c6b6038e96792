//! Simple decoder to inspect encoded tuple space files.
//!
//! Decodes every record in the file with one session (so journals resolve
//! their back-references) and prints the resulting graph.

use std::fs;

use tuplespace::{DecodeSession, Reader, Value};

fn describe(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Buffer(b) => match b.as_str() {
            Some(text) if text.len() <= 80 => out.push_str(&format!("{pad}{text:?}\n")),
            Some(_) | None => out.push_str(&format!("{pad}<{} bytes>\n", b.len())),
        },
        Value::Tuple(t) => {
            for (name, child) in t.entries() {
                match &child {
                    Value::Tuple(inner) if inner.ptr_eq(t) => {
                        out.push_str(&format!("{pad}{name}: <self>\n"));
                    }
                    Value::Tuple(inner) => {
                        out.push_str(&format!("{pad}{name}: ({} entries)\n", inner.len()));
                        if indent < 16 {
                            describe(&child, indent + 1, out);
                        }
                    }
                    Value::Buffer(_) => {
                        out.push_str(&format!("{pad}{name}:\n"));
                        describe(&child, indent + 1, out);
                    }
                }
            }
        }
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .expect("usage: dump_tuples <file>");

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let mut session = DecodeSession::new();
    let mut reader = Reader::new(&data);
    let values = session.decode_all(&mut reader).expect("Failed to decode");

    println!("\n=== Records ({}) ===", values.len());
    for (i, value) in values.iter().enumerate() {
        let mut out = String::new();
        describe(value, 1, &mut out);
        println!("[{}] {:?}", i, value.kind());
        print!("{}", out);
    }

    println!("\n=== Dictionary ===");
    println!("Entries: {}", session.dictionary().len());
    for diagnostic in session.diagnostics() {
        println!("warning: {:?}", diagnostic);
    }
}
