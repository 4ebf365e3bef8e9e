//! Serde helpers for big integers on the wire and on disk.
//!
//! Every integer-bearing field is encoded as a decimal string so that
//! arbitrary-precision values survive JSON without loss.

use num_bigint_dig::BigUint;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

/// A single `BigUint` as a decimal string.
pub mod dec {
    use super::*;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_dec(&s).map_err(DeError::custom)
    }
}

/// A pair of `BigUint`s as a two-element array of decimal strings.
pub mod dec_pair {
    use super::*;

    pub fn serialize<S>(value: &(BigUint, BigUint), serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&value.0.to_str_radix(10))?;
        tuple.serialize_element(&value.1.to_str_radix(10))?;
        tuple.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<(BigUint, BigUint), D::Error>
    where
        D: Deserializer<'de>,
    {
        let (a, b) = <(String, String)>::deserialize(deserializer)?;
        Ok((
            parse_dec(&a).map_err(DeError::custom)?,
            parse_dec(&b).map_err(DeError::custom)?,
        ))
    }
}

/// An ordered set of `BigUint`s as an array of decimal strings.
pub mod dec_set {
    use super::*;
    use std::collections::BTreeSet;

    pub fn serialize<S>(value: &BTreeSet<BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for item in value {
            seq.serialize_element(&item.to_str_radix(10))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|s| parse_dec(s).map_err(DeError::custom))
            .collect()
    }
}

/// Strict decimal parse: digits only, no sign, no whitespace.
pub fn parse_dec(s: &str) -> Result<BigUint, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid decimal integer {s:?}"));
    }
    BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| format!("invalid decimal integer {s:?}"))
}
