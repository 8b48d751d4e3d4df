use super::catalog::{self, ScalarKind};
use super::TraversalFilter;
use crate::error::FilterError;
use crate::graph::{GKey, GValue, Traversal, T};
use graphsync_common::FilterInput;
use serde_json::Value;

/// Applies `operator -> value` predicates to one field of the current element.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilter {
    field: String,
    kind: ScalarKind,
    key: GKey,
}

impl ScalarFilter {
    /// An `id` field of kind `Id` targets the element identifier (`T.id`);
    /// every other field targets the property of the same name.
    pub fn new(field: impl Into<String>, kind: ScalarKind) -> Self {
        let field = field.into();
        let key = if kind == ScalarKind::Id && field == "id" {
            GKey::Token(T::Id)
        } else {
            GKey::String(field.clone())
        };
        Self { field, kind, key }
    }

    /// Always filters on the property named `field`, even for `id`.
    pub fn on_property(field: impl Into<String>, kind: ScalarKind) -> Self {
        let field = field.into();
        Self {
            key: GKey::String(field.clone()),
            field,
            kind,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// One `has` step per operator, in input order. A `null` comparison value
    /// adds no constraint.
    pub fn apply(&self, mut traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        for (name, value) in input {
            let operator = catalog::resolve(self.kind, name)?;
            if value.is_null() {
                continue;
            }
            let predicate = operator
                .build(value, |v| self.kind.coerce(v))
                .map_err(|reason| FilterError::InvalidValue {
                    field: self.field.clone(),
                    operator: name.clone(),
                    reason,
                })?;
            traversal = traversal.has(self.key.clone(), predicate);
        }
        Ok(traversal)
    }
}

impl TraversalFilter for ScalarFilter {
    fn apply(&self, traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        ScalarFilter::apply(self, traversal, input)
    }
}

/// Schema-less filtering over `{field: {operator: value}}` input: every field
/// is a property, comparison values are taken as they come.
#[derive(Debug, Clone, Copy, Default)]
pub struct UntypedFilter;

impl TraversalFilter for UntypedFilter {
    fn apply(&self, mut traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        for (field, operators) in input {
            let operators = match operators {
                Value::Null => continue,
                Value::Object(map) => map,
                other => {
                    return Err(FilterError::ExpectedObject {
                        field: field.clone(),
                        found: other.clone(),
                    })
                }
            };
            for (name, value) in operators {
                let operator = catalog::resolve_untyped(name).ok_or_else(|| FilterError::UnknownUntypedOperator {
                    field: field.clone(),
                    operator: name.clone(),
                })?;
                if value.is_null() {
                    continue;
                }
                let predicate = operator
                    .build(value, |v| Ok(GValue::from_json(v)))
                    .map_err(|reason| FilterError::InvalidValue {
                        field: field.clone(),
                        operator: name.clone(),
                        reason,
                    })?;
                traversal = traversal.has(field.as_str(), predicate);
            }
        }
        Ok(traversal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphTraversalSource, Step, P};
    use serde_json::json;

    fn input(value: Value) -> FilterInput {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_conjunctive_has_steps_in_order() {
        let filter = ScalarFilter::new("age", ScalarKind::Int);
        let t = filter
            .apply(GraphTraversalSource::new().v(), &input(json!({"ge": 18, "lt": 30})))
            .unwrap();

        assert_eq!(
            &t.steps()[1..],
            &[
                Step::Has(GKey::from("age"), P::gte(18)),
                Step::Has(GKey::from("age"), P::lt(30)),
            ]
        );
    }

    #[test]
    fn test_id_field_targets_token() {
        let t = ScalarFilter::new("id", ScalarKind::Id)
            .apply(GraphTraversalSource::new().v(), &input(json!({"in": ["u1", "u2"]})))
            .unwrap();
        assert_eq!(t.steps()[1], Step::Has(GKey::Token(T::Id), P::within(vec!["u1", "u2"])));

        let t = ScalarFilter::on_property("id", ScalarKind::Id)
            .apply(GraphTraversalSource::new().v(), &input(json!({"eq": "x"})))
            .unwrap();
        assert_eq!(t.steps()[1], Step::Has(GKey::from("id"), P::eq("x")));
    }

    #[test]
    fn test_null_value_is_ignored_but_operator_checked() {
        let filter = ScalarFilter::new("name", ScalarKind::String);
        let t = filter
            .apply(GraphTraversalSource::new().v(), &input(json!({"eq": null})))
            .unwrap();
        assert_eq!(t.steps().len(), 1);

        let err = filter
            .apply(GraphTraversalSource::new().v(), &input(json!({"gt": null})))
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownOperator { .. }));
    }

    #[test]
    fn test_invalid_value() {
        let err = ScalarFilter::new("age", ScalarKind::Int)
            .apply(GraphTraversalSource::new().v(), &input(json!({"eq": "old"})))
            .unwrap_err();
        match err {
            FilterError::InvalidValue { field, operator, .. } => {
                assert_eq!(field, "age");
                assert_eq!(operator, "eq");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_untyped_filter() {
        let t = UntypedFilter
            .apply(
                GraphTraversalSource::new().v(),
                &input(json!({"name": {"begins_with": "A"}, "age": {"gte": 21}})),
            )
            .unwrap();
        assert_eq!(
            &t.steps()[1..],
            &[
                Step::Has(GKey::from("name"), P::StartingWith("A".into())),
                Step::Has(GKey::from("age"), P::gte(21)),
            ]
        );
    }

    #[test]
    fn test_untyped_filter_unknown_operator() {
        let err = UntypedFilter
            .apply(GraphTraversalSource::new().v(), &input(json!({"age": {"between": 1}})))
            .unwrap_err();
        match err {
            FilterError::UnknownUntypedOperator { field, operator } => {
                assert_eq!(field, "age");
                assert_eq!(operator, "between");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
