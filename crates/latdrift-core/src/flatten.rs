//! Leaf-address flattening of nested snapshot documents.
//!
//! A snapshot is an arbitrarily nested tree of maps, sequences, and scalars.
//! Diffing works on a flat view of that tree: every scalar leaf gets a stable
//! address string describing its path. A mapping key `k` under prefix `p`
//! yields `p.k`, a sequence element at index `i` yields `p[i]`, and any
//! scalar (including null) terminates recursion and is recorded. Empty maps
//! and empty sequences record nothing at all, so they are invisible to
//! downstream diffing.

use std::collections::BTreeMap;

use serde_json::Value;

/// Flat view of a document: leaf address → scalar value.
pub type FlatMap = BTreeMap<String, Value>;

/// Flatten a document tree into leaf addresses.
///
/// Pure and total: any well-formed [`Value`] is accepted and every scalar
/// leaf maps to exactly one address.
pub fn flatten(doc: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(doc, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let address = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &address, out);
            }
        }
        Value::Array(seq) => {
            for (index, child) in seq.iter().enumerate() {
                flatten_into(child, &format!("{prefix}[{index}]"), out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}

/// Category of a leaf address: the substring before the first `.`, or the
/// whole address when it contains none.
pub fn category_of(path: &str) -> &str {
    path.split_once('.').map(|(head, _)| head).unwrap_or(path)
}
