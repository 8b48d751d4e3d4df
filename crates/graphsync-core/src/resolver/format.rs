// Response shaping: graph value maps -> GraphQL-ready JSON objects

use crate::graph::{isoformat, GKey, GMap, GValue, T};
use serde_json::{Map, Value};

/// Key the element label is exposed under.
pub const TYPENAME_KEY: &str = "__typename";

pub fn format_key(key: &GKey) -> String {
    match key {
        GKey::Token(T::Label) => TYPENAME_KEY.to_string(),
        GKey::Token(t) => t.name().to_string(),
        GKey::String(s) => s.clone(),
    }
}

/// Timestamps become ISO-8601 text; everything else converts as-is.
pub fn format_value(value: &GValue) -> Value {
    match value {
        GValue::Date(dt) => Value::String(isoformat(dt)),
        other => other.to_json(),
    }
}

/// Top-level keys only; nested maps keep their keys untouched.
pub fn format_value_map(map: &GMap) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (format_key(k), format_value(v)))
        .collect()
}

/// Formats one selected record; non-map records pass through `format_value`.
pub fn format_record(record: &GValue) -> Value {
    match record {
        GValue::Map(map) => Value::Object(format_value_map(map)),
        other => format_value(other),
    }
}
