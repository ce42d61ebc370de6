//! Deterministic serialization of JSON-like values.
//!
//! Objects are emitted with keys in byte-wise lexicographic order, arrays keep
//! their order, and scalars use their standard JSON text. No whitespace is
//! emitted. Two structurally equal values always produce identical bytes,
//! which is what every digest and signature in the chain is computed over.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CryptoError, CryptoResult};

/// Canonicalize a JSON value.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonicalize a JSON value and return the UTF-8 bytes.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonicalize(value).into_bytes()
}

/// Canonicalize any serializable value by first converting it to a JSON tree.
///
/// # Errors
///
/// Returns [`CryptoError::Canonicalization`] if the value cannot be
/// represented as JSON (e.g. a map with non-string keys).
pub fn canonicalize_serializable<T: Serialize + ?Sized>(value: &T) -> CryptoResult<String> {
    let tree =
        serde_json::to_value(value).map_err(|e| CryptoError::Canonicalization(e.to_string()))?;
    Ok(canonicalize(&tree))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        },
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_value(out, v);
                }
            }
            out.push('}');
        },
    }
}

fn write_string(out: &mut String, s: &str) {
    // Value's Display is the serde_json string encoder and cannot fail.
    out.push_str(&Value::String(s.to_owned()).to_string());
}
