//! Query string normalization.
//!
//! Array-valued parameters arrive in two encodings, both normalized to a
//! JSON array before validation:
//!
//! - repeated keys: `array=a&array=b`
//! - bracket-suffixed keys: `array_brackets[]=a&array_brackets[]=b`
//!
//! Bracketed keys keep their literal name, so a schema declares the
//! property as `array_brackets[]`. A lone value for a property the schema
//! declares as an array is promoted to a one-element array.

use indexmap::IndexMap;
use serde_json::{Map, Value};

const ARRAY_SUFFIX: &str = "[]";

/// Parses a raw query string into a JSON object.
///
/// `array_keys` lists the properties that always normalize to arrays.
#[must_use]
pub fn normalize_query(raw: Option<&str>, array_keys: &[String]) -> Value {
    let pairs = match raw.filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_pairs(raw),
        None => Vec::new(),
    };

    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }

    let object: Map<String, Value> = grouped
        .into_iter()
        .map(|(key, mut values)| {
            let as_array = values.len() > 1
                || key.ends_with(ARRAY_SUFFIX)
                || array_keys.iter().any(|name| *name == key);
            let value = if as_array {
                Value::from(values)
            } else {
                Value::from(values.pop().unwrap_or_default())
            };
            (key, value)
        })
        .collect();

    Value::Object(object)
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
        Ok(pairs) => pairs,
        Err(err) => {
            tracing::debug!(error = %err, "unparseable query string treated as empty");
            Vec::new()
        }
    }
}
