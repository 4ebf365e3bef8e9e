//! Canonical JSON for hash inputs.
//!
//! Hash-chain links and Merkle leaves are computed over a byte-stable
//! serialization: object keys sorted, compact separators, integers already
//! rendered as decimal strings by the wire types. Round-tripping a stored
//! entry must reproduce the exact bytes that were hashed.

use serde::Serialize;

/// Serialize with sorted keys and no extraneous whitespace.
///
/// Routing through `serde_json::Value` sorts object keys (the map is a
/// `BTreeMap`), and `Value::to_string` emits the compact form.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(value.to_string())
}
