// Graph value model shared by traversals, providers and the response formatter

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Reserved system keys of a graph element (Gremlin's `T` enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum T {
    Id,
    Label,
    Key,
    Value,
}

impl T {
    pub fn name(&self) -> &'static str {
        match self {
            T::Id => "id",
            T::Label => "label",
            T::Key => "key",
            T::Value => "value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(T::Id),
            "label" => Some(T::Label),
            "key" => Some(T::Key),
            "value" => Some(T::Value),
            _ => None,
        }
    }
}

/// Identifier of a vertex or edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementId {
    Int(i64),
    String(String),
    Uuid(Uuid),
}

impl ElementId {
    pub fn new_random() -> Self {
        ElementId::String(Uuid::new_v4().to_string())
    }

    /// Loose match used by `V(ids)`/`hasId`: a string id equals an int id with
    /// the same decimal text, as Gremlin servers accept either form.
    pub fn matches(&self, value: &GValue) -> bool {
        match ElementId::try_from(value.clone()) {
            Ok(other) => self == &other || self.to_string() == other.to_string(),
            Err(_) => false,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Int(i) => write!(f, "{}", i),
            ElementId::String(s) => write!(f, "{}", s),
            ElementId::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        ElementId::String(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        ElementId::String(s)
    }
}

impl From<i64> for ElementId {
    fn from(i: i64) -> Self {
        ElementId::Int(i)
    }
}

impl From<Uuid> for ElementId {
    fn from(u: Uuid) -> Self {
        ElementId::Uuid(u)
    }
}

impl From<ElementId> for GValue {
    fn from(id: ElementId) -> Self {
        match id {
            ElementId::Int(i) => GValue::Int(i),
            ElementId::String(s) => GValue::String(s),
            ElementId::Uuid(u) => GValue::Uuid(u),
        }
    }
}

impl TryFrom<GValue> for ElementId {
    type Error = GValue;

    fn try_from(value: GValue) -> Result<Self, Self::Error> {
        match value {
            GValue::Int(i) => Ok(ElementId::Int(i)),
            GValue::String(s) => Ok(ElementId::String(s)),
            GValue::Uuid(u) => Ok(ElementId::Uuid(u)),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: ElementId,
    pub label: String,
    pub out_v: ElementId,
    pub in_v: ElementId,
}

/// Map key: either a plain property name or a system token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GKey {
    Token(T),
    String(String),
}

impl From<T> for GKey {
    fn from(t: T) -> Self {
        GKey::Token(t)
    }
}

impl From<&str> for GKey {
    fn from(s: &str) -> Self {
        GKey::String(s.to_string())
    }
}

impl From<String> for GKey {
    fn from(s: String) -> Self {
        GKey::String(s)
    }
}

/// Insertion-ordered map, as returned by `valueMap`/`project`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GMap(Vec<(GKey, GValue)>);

impl GMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<GKey>, value: GValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &GKey) -> Option<&GValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&GValue> {
        self.0.iter()
            .find(|(k, _)| matches!(k, GKey::String(s) if s == key))
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &GKey) -> Option<GValue> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(GKey, GValue)> {
        self.0.iter()
    }
}

impl IntoIterator for GMap {
    type Item = (GKey, GValue);
    type IntoIter = std::vec::IntoIter<(GKey, GValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(GKey, GValue)> for GMap {
    fn from_iter<I: IntoIterator<Item = (GKey, GValue)>>(iter: I) -> Self {
        let mut map = GMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Uuid(Uuid),
    List(Vec<GValue>),
    Map(GMap),
    Vertex(Vertex),
    Edge(Edge),
    Token(T),
}

impl GValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            GValue::Null => "null",
            GValue::Bool(_) => "bool",
            GValue::Int(_) => "int",
            GValue::Float(_) => "float",
            GValue::String(_) => "string",
            GValue::Date(_) => "date",
            GValue::Uuid(_) => "uuid",
            GValue::List(_) => "list",
            GValue::Map(_) => "map",
            GValue::Vertex(_) => "vertex",
            GValue::Edge(_) => "edge",
            GValue::Token(_) => "token",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Value equality with numeric widening (`1 == 1.0`), as Gremlin compares.
    pub fn loose_eq(&self, other: &GValue) -> bool {
        match (self, other) {
            (GValue::Int(a), GValue::Float(b)) | (GValue::Float(b), GValue::Int(a)) => (*a as f64) == *b,
            (GValue::Uuid(a), GValue::String(b)) | (GValue::String(b), GValue::Uuid(a)) => a.to_string() == *b,
            _ => self == other,
        }
    }

    /// Ordering for relational predicates; `None` when the types are not comparable.
    pub fn compare(&self, other: &GValue) -> Option<Ordering> {
        match (self, other) {
            (GValue::Int(a), GValue::Int(b)) => Some(a.cmp(b)),
            (GValue::Float(a), GValue::Float(b)) => a.partial_cmp(b),
            (GValue::Int(a), GValue::Float(b)) => (*a as f64).partial_cmp(b),
            (GValue::Float(a), GValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (GValue::String(a), GValue::String(b)) => Some(a.cmp(b)),
            (GValue::Date(a), GValue::Date(b)) => Some(a.cmp(b)),
            (GValue::Bool(a), GValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Plain JSON value; dates become ISO-8601 text, elements become `{id, label}` maps.
    pub fn to_json(&self) -> Value {
        match self {
            GValue::Null => Value::Null,
            GValue::Bool(b) => Value::Bool(*b),
            GValue::Int(i) => Value::Number((*i).into()),
            GValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            GValue::String(s) => Value::String(s.clone()),
            GValue::Date(d) => Value::String(isoformat(d)),
            GValue::Uuid(u) => Value::String(u.to_string()),
            GValue::List(items) => Value::Array(items.iter().map(GValue::to_json).collect()),
            GValue::Map(map) => {
                let mut out = Map::new();
                for (k, v) in map.iter() {
                    out.insert(key_name(k), v.to_json());
                }
                Value::Object(out)
            }
            GValue::Vertex(v) => serde_json::json!({
                "id": GValue::from(v.id.clone()).to_json(),
                "label": v.label,
            }),
            GValue::Edge(e) => serde_json::json!({
                "id": GValue::from(e.id.clone()).to_json(),
                "label": e.label,
                "outV": GValue::from(e.out_v.clone()).to_json(),
                "inV": GValue::from(e.in_v.clone()).to_json(),
            }),
            GValue::Token(t) => Value::String(t.name().to_string()),
        }
    }

    /// Untyped conversion from JSON: integers stay integers, objects become string-keyed maps.
    pub fn from_json(value: &Value) -> GValue {
        match value {
            Value::Null => GValue::Null,
            Value::Bool(b) => GValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => GValue::Int(i),
                None => GValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => GValue::String(s.clone()),
            Value::Array(items) => GValue::List(items.iter().map(GValue::from_json).collect()),
            Value::Object(map) => GValue::Map(
                map.iter()
                    .map(|(k, v)| (GKey::String(k.clone()), GValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn key_name(key: &GKey) -> String {
    match key {
        GKey::Token(t) => t.name().to_string(),
        GKey::String(s) => s.clone(),
    }
}

/// ISO-8601 text of a UTC timestamp without offset; fractional seconds only
/// when present (`2023-05-01T00:00:00`, `2023-05-01T00:00:00.250000`).
pub fn isoformat(dt: &DateTime<Utc>) -> String {
    let naive = dt.naive_utc();
    if dt.timestamp_subsec_micros() == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

impl From<bool> for GValue {
    fn from(b: bool) -> Self {
        GValue::Bool(b)
    }
}

impl From<i64> for GValue {
    fn from(i: i64) -> Self {
        GValue::Int(i)
    }
}

impl From<i32> for GValue {
    fn from(i: i32) -> Self {
        GValue::Int(i as i64)
    }
}

impl From<f64> for GValue {
    fn from(f: f64) -> Self {
        GValue::Float(f)
    }
}

impl From<&str> for GValue {
    fn from(s: &str) -> Self {
        GValue::String(s.to_string())
    }
}

impl From<String> for GValue {
    fn from(s: String) -> Self {
        GValue::String(s)
    }
}

impl From<DateTime<Utc>> for GValue {
    fn from(d: DateTime<Utc>) -> Self {
        GValue::Date(d)
    }
}

impl From<Uuid> for GValue {
    fn from(u: Uuid) -> Self {
        GValue::Uuid(u)
    }
}

impl From<T> for GValue {
    fn from(t: T) -> Self {
        GValue::Token(t)
    }
}

impl<V: Into<GValue>> From<Vec<V>> for GValue {
    fn from(items: Vec<V>) -> Self {
        GValue::List(items.into_iter().map(Into::into).collect())
    }
}
