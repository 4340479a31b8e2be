//! Configuration document codec.
//!
//! Documents are plain JSON trees. Object members keep their insertion order
//! (serde_json `preserve_order`), so serializing the same tree always yields
//! the same bytes. Change detection relies on that.

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// A configuration document.
pub type Document = Value;

/// The empty document (`{}`) used when a tier contributes nothing.
pub fn empty_document() -> Document {
    Value::Object(Map::new())
}

/// Parse text into a document.
///
/// Failures carry the byte offset where the parser gave up.
pub fn parse(text: &str) -> Result<Document, ConfigError> {
    serde_json::from_str(text).map_err(|e| parse_error(text, &e))
}

/// Parse text that must hold an object at its root.
///
/// Tier documents are always objects; anything else is rejected the same
/// way malformed text is.
pub fn parse_object(text: &str) -> Result<Document, ConfigError> {
    let doc = parse(text)?;
    if doc.is_object() {
        Ok(doc)
    } else {
        Err(ConfigError::Parse {
            offset: 0,
            message: format!("document root is {}, expected object", kind_name(&doc)),
        })
    }
}

/// Serialize a document to its canonical compact text.
pub fn serialize(doc: &Document) -> String {
    doc.to_string()
}

/// Serialize a document for humans. Never used for comparison or persistence.
pub fn serialize_pretty(doc: &Document) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_else(|_| serialize(doc))
}

/// Byte-exact comparison of the canonical serializations.
///
/// Structurally equal documents with different key order compare unequal.
pub fn documents_equal(a: &Document, b: &Document) -> bool {
    serialize(a) == serialize(b)
}

fn parse_error(text: &str, err: &serde_json::Error) -> ConfigError {
    let (line, column) = (err.line(), err.column());
    let message = err.to_string();
    let message = message
        .strip_suffix(&format!(" at line {} column {}", line, column))
        .map(String::from)
        .unwrap_or(message);

    ConfigError::Parse {
        offset: byte_offset(text, line, column),
        message,
    }
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(text.len())
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
