use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub mod config;

use config::{DEFAULT_PAGE, DEFAULT_PER_PAGE};

/// Nested filter argument, keyed by field name. Key order is the order the
/// client sent, which is the order filters are applied in.
pub type FilterInput = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("invalid invocation payload: {0}")]
    Payload(String),
    #[error("missing required argument `{0}`")]
    Missing(String),
    #[error("invalid argument `{name}`: {reason}")]
    Invalid { name: String, reason: String },
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
}

/// Identifies a resolver by the GraphQL type and field it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolverKey {
    pub type_name: String,
    pub field_name: String,
}

impl ResolverKey {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl<A: Into<String>, B: Into<String>> From<(A, B)> for ResolverKey {
    fn from((type_name, field_name): (A, B)) -> Self {
        Self::new(type_name, field_name)
    }
}

impl fmt::Display for ResolverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

#[derive(Debug, Deserialize)]
struct InvocationInfo {
    #[serde(rename = "parentTypeName")]
    parent_type_name: Option<String>,
    #[serde(rename = "fieldName")]
    field_name: Option<String>,
}

/// Wire shape of one invocation event. Both the flat `type_name`/`field_name`
/// form and AppSync's `info` block are accepted.
#[derive(Debug, Deserialize)]
struct InvocationEvent {
    type_name: Option<String>,
    field_name: Option<String>,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
    #[serde(default)]
    identity: Option<Value>,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default)]
    info: Option<InvocationInfo>,
}

/// One resolver invocation. Built once per event (or batch element) and only
/// ever read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverInput {
    type_name: String,
    field_name: String,
    arguments: Map<String, Value>,
    identity: Option<Map<String, Value>>,
    source: Option<Map<String, Value>>,
}

impl ResolverInput {
    pub fn new(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        arguments: Map<String, Value>,
        identity: Option<Map<String, Value>>,
        source: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
            arguments,
            identity,
            source,
        }
    }

    /// Normalizes a raw invocation event.
    pub fn from_event(event: Value) -> Result<Self, ArgumentError> {
        let event: InvocationEvent = serde_json::from_value(event)
            .map_err(|e| ArgumentError::Payload(e.to_string()))?;

        let info = event.info.as_ref();
        let type_name = event.type_name
            .or_else(|| info.and_then(|i| i.parent_type_name.clone()))
            .ok_or_else(|| ArgumentError::Payload("missing `type_name`".to_string()))?;
        let field_name = event.field_name
            .or_else(|| info.and_then(|i| i.field_name.clone()))
            .ok_or_else(|| ArgumentError::Payload("missing `field_name`".to_string()))?;

        Ok(Self {
            type_name,
            field_name,
            arguments: event.arguments.unwrap_or_default(),
            identity: optional_object("identity", event.identity)?,
            source: optional_object("source", event.source)?,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn key(&self) -> ResolverKey {
        ResolverKey::new(self.type_name.as_str(), self.field_name.as_str())
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn identity(&self) -> Option<&Map<String, Value>> {
        self.identity.as_ref()
    }

    pub fn source(&self) -> Option<&Map<String, Value>> {
        self.source.as_ref()
    }

    /// Deserializes a required argument.
    pub fn argument<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Err(ArgumentError::Missing(name.to_string())),
            Some(value) => deserialize_named(name, value),
        }
    }

    /// Deserializes an optional argument; absent and `null` both give `None`.
    pub fn optional_argument<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArgumentError> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => deserialize_named(name, value).map(Some),
        }
    }

    /// Reads a field of the parent object in a nested resolution.
    pub fn source_field<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self.source
            .as_ref()
            .and_then(|s| s.get(name))
            .filter(|v| !v.is_null())
            .ok_or_else(|| ArgumentError::Missing(format!("source.{}", name)))?;
        deserialize_named(name, value)
    }

    /// The `input` argument, or an empty filter.
    pub fn filter_input(&self) -> Result<FilterInput, ArgumentError> {
        match self.arguments.get("input") {
            None | Some(Value::Null) => Ok(FilterInput::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(ArgumentError::Invalid {
                name: "input".to_string(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }

    /// The `pagination` argument with per-field defaults.
    pub fn pagination(&self) -> Result<PaginationInfo, ArgumentError> {
        match self.arguments.get("pagination") {
            None | Some(Value::Null) => Ok(PaginationInfo::default()),
            Some(value) => PaginationInfo::from_value(value),
        }
    }
}

fn optional_object(name: &str, value: Option<Value>) -> Result<Option<Map<String, Value>>, ArgumentError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(ArgumentError::Payload(format!("`{}` must be an object, got {}", name, other))),
    }
}

fn deserialize_named<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ArgumentError> {
    T::deserialize(value).map_err(|e| ArgumentError::Invalid {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationInfo {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationInfo {
    pub fn new(page: u32, per_page: u32) -> Result<Self, ArgumentError> {
        if page == 0 || per_page == 0 {
            return Err(ArgumentError::InvalidPagination(format!(
                "page and per_page must be >= 1 (got page={}, per_page={})",
                page, per_page
            )));
        }
        Ok(Self { page, per_page })
    }

    fn from_value(value: &Value) -> Result<Self, ArgumentError> {
        let map = value.as_object().ok_or_else(|| {
            ArgumentError::InvalidPagination(format!("expected an object, got {}", value))
        })?;
        let page = positive_field(map, "page", DEFAULT_PAGE)?;
        let per_page = positive_field(map, "per_page", DEFAULT_PER_PAGE)?;
        Self::new(page, per_page)
    }

    /// Half-open element window `[first, last)` for this page.
    pub fn window(&self) -> (u64, u64) {
        let page = self.page as u64;
        let per_page = self.per_page as u64;
        ((page - 1) * per_page, page * per_page)
    }

    /// Number of pages needed for `matching` elements.
    pub fn total_pages(&self, matching: u64) -> u64 {
        matching.div_ceil(self.per_page as u64)
    }
}

fn positive_field(map: &Map<String, Value>, name: &str, default: u32) -> Result<u32, ArgumentError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
            .ok_or_else(|| ArgumentError::InvalidPagination(format!("`{}` must be an integer >= 1, got {}", name, value))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(data: Vec<T>, pagination: PaginationInfo, matching: u64) -> Self {
        Self {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total: pagination.total_pages(matching),
        }
    }
}

/// Uniform failure shape returned across the invocation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_type: String,
    pub error_message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ErrorEnvelope {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}
