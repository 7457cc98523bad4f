//! Schemaless document helpers.
//!
//! Sync payloads are JSON objects whose shape is enforced by the per-entity
//! validators rather than by Rust structs; the conflict algebra and the
//! identity heuristics need to walk arbitrary keys, so the whole engine
//! works over [`Document`] values.

use serde_json::{Map, Value};

/// A single record as stored in (and exchanged with) the document store.
pub type Document = Map<String, Value>;

/// Read a field as a trimmed string slice, treating null and non-strings as
/// absent.
pub fn get_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str).map(str::trim)
}

/// Read a field as a float, accepting any JSON number.
pub fn get_f64(doc: &Document, field: &str) -> Option<f64> {
    doc.get(field).and_then(Value::as_f64)
}

/// Field equality with numeric coercion: `40` and `40.0` compare equal,
/// everything else uses plain JSON equality. Null and absent both count as
/// "no value" and never equal a present value.
pub fn value_equals(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => false,
    }
}

fn normalize(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Null) | None => None,
        other => other,
    }
}

/// `true` when the field is absent, null, or an empty / whitespace string.
pub fn is_blank(doc: &Document, field: &str) -> bool {
    match doc.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Overlay `patch` onto `base`: every key present in `patch` replaces the
/// corresponding key in `base`. Returns the union.
pub fn overlay(base: &Document, patch: &Document) -> Document {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
