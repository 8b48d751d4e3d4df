use super::catalog::ScalarKind;
use super::relationship::{Relationship, RelationshipFilter};
use super::scalar::ScalarFilter;
use super::schema::FilterContext;
use crate::error::FilterError;
use crate::graph::Traversal;
use graphsync_common::FilterInput;
use serde_json::Value;

/// Sub-filter bound to one field of a vertex filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Scalar(ScalarFilter),
    /// Another vertex filter, by name, applied to the same element.
    Vertex(String),
    Relationship(RelationshipFilter),
}

impl Filter {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Filter::Scalar(_))
    }

    fn apply(
        &self,
        traversal: Traversal,
        field: &str,
        value: &Value,
        ctx: &FilterContext<'_>,
    ) -> Result<Traversal, FilterError> {
        let input = value.as_object().ok_or_else(|| FilterError::ExpectedObject {
            field: field.to_string(),
            found: value.clone(),
        })?;

        match self {
            Filter::Scalar(scalar) => scalar.apply(traversal, input),
            Filter::Vertex(name) => {
                let ctx = ctx.descend()?;
                ctx.schema().get(name)?.apply(traversal, input, &ctx)
            }
            Filter::Relationship(relationship) => relationship.apply(traversal, input, ctx),
        }
    }
}

/// Filter over vertices with one label: `hasLabel(label)` followed by the
/// sub-filter of every field present in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexFilter {
    name: String,
    label: String,
    fields: Vec<(String, Filter)>,
}

impl VertexFilter {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            fields: Vec::new(),
        }
    }

    /// Binds `field` to `filter`, replacing any earlier binding.
    pub fn field(mut self, field: impl Into<String>, filter: Filter) -> Self {
        let field = field.into();
        self.fields.retain(|(f, _)| *f != field);
        self.fields.push((field, filter));
        self
    }

    pub fn scalar(self, field: impl Into<String>, kind: ScalarKind) -> Self {
        let field = field.into();
        let filter = Filter::Scalar(ScalarFilter::new(field.clone(), kind));
        self.field(field, filter)
    }

    pub fn relationship(self, field: impl Into<String>, relationship: Relationship, target: impl Into<String>) -> Self {
        self.field(field, Filter::Relationship(RelationshipFilter::new(relationship, target)))
    }

    pub fn vertex(self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(field, Filter::Vertex(target.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.fields.iter().map(|(f, filter)| (f.as_str(), filter))
    }

    fn lookup(&self, field: &str) -> Option<&Filter> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, filter)| filter)
    }

    /// Every field is resolved before any step is added, so an unknown field
    /// fails regardless of its position. Scalar fields are applied before
    /// relationship fields; input order is kept within each group.
    pub fn apply(
        &self,
        traversal: Traversal,
        input: &FilterInput,
        ctx: &FilterContext<'_>,
    ) -> Result<Traversal, FilterError> {
        let mut resolved = Vec::with_capacity(input.len());
        for (field, value) in input {
            let filter = self.lookup(field).ok_or_else(|| FilterError::UnknownField {
                filter: self.name.clone(),
                field: field.clone(),
            })?;
            if value.is_null() {
                continue;
            }
            resolved.push((field.as_str(), filter, value));
        }
        resolved.sort_by_key(|(_, filter, _)| !filter.is_scalar());

        let mut traversal = traversal.has_label(self.label.as_str());
        for (field, filter, value) in resolved {
            traversal = filter.apply(traversal, field, value, ctx)?;
        }
        Ok(traversal)
    }
}
