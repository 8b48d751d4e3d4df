// Predicate catalog: which operators each scalar kind accepts, and how their
// JSON comparison values become graph predicates.

use crate::error::FilterError;
use crate::graph::{GValue, P};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Enum,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Id => "id",
            ScalarKind::String => "string",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Enum => "enum",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    NotContains,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
}

const ID_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
];

const STRING_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
    ("contains", Operator::Contains),
    ("not_contains", Operator::NotContains),
    ("begins_with", Operator::BeginsWith),
    ("not_begins_with", Operator::NotBeginsWith),
    ("ends_with", Operator::EndsWith),
    ("not_ends_with", Operator::NotEndsWith),
];

const ORDERED_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("lt", Operator::Lt),
    ("le", Operator::Le),
    ("gt", Operator::Gt),
    ("ge", Operator::Ge),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
];

const BOOLEAN_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
];

// Enum inputs historically spelled not-equals as `neq`; both are accepted.
const ENUM_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("neq", Operator::Ne),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
];

// Schema-less filtering: every operator, plus the `gte` spelling of `ge`.
const UNTYPED_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("lt", Operator::Lt),
    ("le", Operator::Le),
    ("gt", Operator::Gt),
    ("ge", Operator::Ge),
    ("gte", Operator::Ge),
    ("in", Operator::In),
    ("not_in", Operator::NotIn),
    ("contains", Operator::Contains),
    ("not_contains", Operator::NotContains),
    ("begins_with", Operator::BeginsWith),
    ("not_begins_with", Operator::NotBeginsWith),
    ("ends_with", Operator::EndsWith),
    ("not_ends_with", Operator::NotEndsWith),
];

impl ScalarKind {
    /// Operator names accepted for this kind, with the operator each maps to.
    pub fn operators(&self) -> &'static [(&'static str, Operator)] {
        match self {
            ScalarKind::Id => ID_OPERATORS,
            ScalarKind::String => STRING_OPERATORS,
            ScalarKind::Int | ScalarKind::Float | ScalarKind::DateTime => ORDERED_OPERATORS,
            ScalarKind::Boolean => BOOLEAN_OPERATORS,
            ScalarKind::Enum => ENUM_OPERATORS,
        }
    }

    /// Converts one JSON comparison value to the graph value stored for this kind.
    pub fn coerce(&self, value: &Value) -> Result<GValue, String> {
        match self {
            ScalarKind::Id => match value {
                Value::String(s) => Ok(GValue::from(s.as_str())),
                Value::Number(n) if n.is_i64() || n.is_u64() => n
                    .as_i64()
                    .map(GValue::Int)
                    .ok_or_else(|| format!("id {} is out of range", n)),
                other => Err(format!("expected a string or integer id, got {}", other)),
            },
            ScalarKind::String | ScalarKind::Enum => value
                .as_str()
                .map(GValue::from)
                .ok_or_else(|| format!("expected a string, got {}", value)),
            ScalarKind::Int => value
                .as_i64()
                .map(GValue::Int)
                .ok_or_else(|| format!("expected an integer, got {}", value)),
            ScalarKind::Float => value
                .as_f64()
                .map(GValue::Float)
                .ok_or_else(|| format!("expected a number, got {}", value)),
            ScalarKind::Boolean => value
                .as_bool()
                .map(GValue::Bool)
                .ok_or_else(|| format!("expected a boolean, got {}", value)),
            ScalarKind::DateTime => match value {
                Value::String(s) => parse_datetime(s)
                    .map(GValue::Date)
                    .ok_or_else(|| format!("`{}` is not an ISO-8601 timestamp", s)),
                other => Err(format!("expected an ISO-8601 timestamp string, got {}", other)),
            },
        }
    }
}

/// RFC 3339 with offset, or a naive timestamp / date read as UTC.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Looks up `name` in the catalog of `kind`.
pub fn resolve(kind: ScalarKind, name: &str) -> Result<Operator, FilterError> {
    kind.operators()
        .iter()
        .find(|(op, _)| *op == name)
        .map(|(_, op)| *op)
        .ok_or_else(|| FilterError::UnknownOperator {
            kind,
            operator: name.to_string(),
        })
}

/// Looks up `name` without a scalar kind, for schema-less filters.
pub(crate) fn resolve_untyped(name: &str) -> Option<Operator> {
    UNTYPED_OPERATORS
        .iter()
        .find(|(op, _)| *op == name)
        .map(|(_, op)| *op)
}

impl Operator {
    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Operator::Contains
                | Operator::NotContains
                | Operator::BeginsWith
                | Operator::NotBeginsWith
                | Operator::EndsWith
                | Operator::NotEndsWith
        )
    }

    /// Builds the predicate, converting each comparison value with `coerce`.
    pub fn build<F>(&self, value: &Value, coerce: F) -> Result<P, String>
    where
        F: Fn(&Value) -> Result<GValue, String>,
    {
        if self.is_membership() {
            let items = value
                .as_array()
                .ok_or_else(|| format!("expected a list, got {}", value))?;
            let values = items.iter().map(&coerce).collect::<Result<Vec<_>, _>>()?;
            return Ok(match self {
                Operator::In => P::Within(values),
                _ => P::Without(values),
            });
        }

        if self.is_text() {
            let text = value
                .as_str()
                .ok_or_else(|| format!("expected a string, got {}", value))?
                .to_string();
            return Ok(match self {
                Operator::Contains => P::Containing(text),
                Operator::NotContains => P::NotContaining(text),
                Operator::BeginsWith => P::StartingWith(text),
                Operator::NotBeginsWith => P::NotStartingWith(text),
                Operator::EndsWith => P::EndingWith(text),
                _ => P::NotEndingWith(text),
            });
        }

        let value = coerce(value)?;
        Ok(match self {
            Operator::Eq => P::Eq(value),
            Operator::Ne => P::Neq(value),
            Operator::Lt => P::Lt(value),
            Operator::Le => P::Lte(value),
            Operator::Gt => P::Gt(value),
            _ => P::Gte(value),
        })
    }
}
