//! Boundary normalisation for manifest fields with more than one accepted shape
//!
//! YAML manifests may declare `api: 4.0.0` or `api: [4.0.0, 5.0.0]`, and path
//! mappings are written as ordered mappings. These helpers turn every shape
//! into one canonical representation at deserialisation time so nothing
//! downstream has to ask whether a field was a scalar.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_yml::Value;

/// Deserialize a scalar-or-list field into a list of strings.
///
/// `null` and a missing field both yield an empty list. Nested lists are
/// flattened in order; mappings are dropped.
///
/// # Errors
///
/// Returns an error only if the underlying document is malformed.
pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(flatten).unwrap_or_default())
}

/// Deserialize an optional scalar (string, number or bool) into a string.
///
/// # Errors
///
/// Returns an error only if the underlying document is malformed.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

/// Deserialize a mapping into `(key, value)` pairs, keeping document order.
///
/// # Errors
///
/// Returns an error if the field is neither a mapping nor null.
pub fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of source paths to archive paths")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<Value, Value>()? {
                if let (Some(key), Some(value)) = (scalar_to_string(&key), scalar_to_string(&value))
                {
                    pairs.push((key, value));
                }
            }
            Ok(pairs)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(PairsVisitor)
}

/// Render a YAML scalar as a string; returns `None` for mappings, sequences and null.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flatten(value: Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.into_iter().flat_map(flatten).collect(),
        other => scalar_to_string(&other).into_iter().collect(),
    }
}
