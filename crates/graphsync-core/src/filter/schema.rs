use super::vertex::{Filter, VertexFilter};
use super::TraversalFilter;
use crate::error::FilterError;
use crate::graph::Traversal;
use graphsync_common::config::{FilterConfig, DEFAULT_FILTER_MAX_DEPTH};
use graphsync_common::FilterInput;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of named vertex filters. Relationship and nested vertex filters
/// refer to their target by name, so a filter may reference itself.
#[derive(Debug, Clone)]
pub struct FilterSchema {
    filters: HashMap<String, VertexFilter>,
    max_depth: usize,
}

impl FilterSchema {
    pub fn builder() -> FilterSchemaBuilder {
        FilterSchemaBuilder::default()
    }

    pub fn get(&self, name: &str) -> Result<&VertexFilter, FilterError> {
        self.filters
            .get(name)
            .ok_or_else(|| FilterError::UnknownFilter(name.to_string()))
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Applies the vertex filter `name` at the top level.
    pub fn apply(&self, name: &str, traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        let ctx = FilterContext { schema: self, depth: 0 };
        self.get(name)?.apply(traversal, input, &ctx)
    }

    /// A shareable handle that applies the vertex filter `name`.
    pub fn filter(self: &Arc<Self>, name: &str) -> Result<NamedFilter, FilterError> {
        self.get(name)?;
        Ok(NamedFilter {
            schema: Arc::clone(self),
            name: name.to_string(),
        })
    }
}

pub struct FilterSchemaBuilder {
    filters: Vec<VertexFilter>,
    max_depth: usize,
}

impl Default for FilterSchemaBuilder {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            max_depth: DEFAULT_FILTER_MAX_DEPTH,
        }
    }
}

impl FilterSchemaBuilder {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn config(self, config: &FilterConfig) -> Self {
        self.max_depth(config.max_depth)
    }

    pub fn vertex(mut self, filter: VertexFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Fails with `UnknownFilter` if any field refers to an unregistered filter.
    pub fn build(self) -> Result<FilterSchema, FilterError> {
        let mut filters = HashMap::with_capacity(self.filters.len());
        for filter in self.filters {
            if filters.contains_key(filter.name()) {
                tracing::warn!("Vertex filter {} registered twice; keeping the last one", filter.name());
            }
            filters.insert(filter.name().to_string(), filter);
        }

        for filter in filters.values() {
            for (_, field) in filter.fields() {
                let target = match field {
                    Filter::Scalar(_) => continue,
                    Filter::Vertex(name) => name.as_str(),
                    Filter::Relationship(r) => r.target(),
                };
                if !filters.contains_key(target) {
                    return Err(FilterError::UnknownFilter(target.to_string()));
                }
            }
        }

        tracing::debug!("Built filter schema with {} vertex filters", filters.len());
        Ok(FilterSchema {
            filters,
            max_depth: self.max_depth,
        })
    }
}

/// Position of one application inside a (possibly nested) filter input.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    schema: &'a FilterSchema,
    depth: usize,
}

impl<'a> FilterContext<'a> {
    pub fn new(schema: &'a FilterSchema) -> Self {
        Self { schema, depth: 0 }
    }

    pub fn schema(&self) -> &'a FilterSchema {
        self.schema
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context one nesting level down.
    pub fn descend(&self) -> Result<Self, FilterError> {
        let depth = self.depth + 1;
        if depth > self.schema.max_depth {
            return Err(FilterError::DepthExceeded {
                max_depth: self.schema.max_depth,
            });
        }
        Ok(Self {
            schema: self.schema,
            depth,
        })
    }
}

/// Vertex filter bound to its schema.
#[derive(Debug, Clone)]
pub struct NamedFilter {
    schema: Arc<FilterSchema>,
    name: String,
}

impl NamedFilter {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TraversalFilter for NamedFilter {
    fn apply(&self, traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        self.schema.apply(&self.name, traversal, input)
    }
}
