// Resolver pipelines
// Each variant wraps a base traversal with the stages its result shape needs:
// filter, selection, pagination and formatting.

use super::format::format_record;
use super::{BaseTraversal, Resolver, Selection};
use crate::error::ResolverError;
use crate::filter::TraversalFilter;
use crate::graph::{GValue, GraphTraversalSource, Traversal, TraversalSource, __};
use async_trait::async_trait;
use graphsync_common::{PaginatedResult, PaginationInfo, ResolverInput};
use serde_json::Value;
use std::sync::Arc;

/// `valueMap(true).by(unfold())`: id, label and single-valued properties.
pub fn default_selection(traversal: Traversal) -> Traversal {
    traversal.value_map(true).by(__::unfold())
}

fn selection_arc() -> Selection {
    Arc::new(default_selection)
}

fn base_arc<B>(base: B) -> BaseTraversal
where
    B: Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync + 'static,
{
    Arc::new(base)
}

/// Filtered, paginated list of vertices.
///
/// Filtering, counting and slicing happen in one traversal:
/// `fold().project("data", "total").by(unfold().range(first, last).fold()).by(unfold().count())`.
#[derive(Clone)]
pub struct VertexListResolver {
    base: BaseTraversal,
    filter: Arc<dyn TraversalFilter>,
    selection: Selection,
    paginate: bool,
}

impl VertexListResolver {
    pub fn new<F, B>(filter: F, base: B) -> Self
    where
        F: TraversalFilter + 'static,
        B: Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync + 'static,
    {
        Self {
            base: base_arc(base),
            filter: Arc::new(filter),
            selection: selection_arc(),
            paginate: true,
        }
    }

    pub fn with_selection<S>(mut self, selection: S) -> Self
    where
        S: Fn(Traversal) -> Traversal + Send + Sync + 'static,
    {
        self.selection = Arc::new(selection);
        self
    }

    /// Returns every matching record as a plain list, ignoring `pagination`.
    pub fn without_pagination(mut self) -> Self {
        self.paginate = false;
        self
    }

    async fn paginated(
        &self,
        source: &TraversalSource,
        selected: Traversal,
        pagination: PaginationInfo,
    ) -> Result<Value, ResolverError> {
        let (first, last) = pagination.window();
        let traversal = selected
            .fold()
            .project(["data", "total"])
            .by(__::unfold().range(saturating_i64(first), saturating_i64(last)).fold())
            .by(__::unfold().count());

        let projected = source
            .to_list(&traversal)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResolverError::UnexpectedShape("pagination projection returned nothing".to_string()))?;
        let projected = match projected {
            GValue::Map(map) => map,
            other => {
                return Err(ResolverError::UnexpectedShape(format!(
                    "pagination projection returned a {}",
                    other.type_name()
                )))
            }
        };

        let data = match projected.get_str("data") {
            None => Vec::new(),
            Some(GValue::List(records)) => records.iter().map(format_record).collect(),
            Some(other) => {
                return Err(ResolverError::UnexpectedShape(format!(
                    "expected a list of records, got {}",
                    other.type_name()
                )))
            }
        };
        let matching = match projected.get_str("total") {
            None => 0,
            Some(GValue::Int(n)) if *n >= 0 => *n as u64,
            Some(other) => {
                return Err(ResolverError::UnexpectedShape(format!(
                    "expected a non-negative count, got {}",
                    other.type_name()
                )))
            }
        };

        tracing::debug!(
            "Page {} of {} matching elements ({} per page)",
            pagination.page,
            matching,
            pagination.per_page
        );
        let result = PaginatedResult::new(data, pagination, matching);
        serde_json::to_value(result).map_err(|e| ResolverError::Custom(e.into()))
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl Resolver for VertexListResolver {
    async fn resolve(&self, source: &TraversalSource, input: &ResolverInput) -> Result<Value, ResolverError> {
        let filter_input = input.filter_input()?;
        let pagination = input.pagination()?;

        let base = (self.base)(source.g(), input)?;
        let filtered = self.filter.apply(base, &filter_input)?;
        let selected = (self.selection)(filtered);

        if self.paginate {
            return self.paginated(source, selected, pagination).await;
        }

        let records = source.to_list(&selected).await?;
        Ok(Value::Array(records.iter().map(format_record).collect()))
    }
}

/// First matching vertex, or `null` when there is none.
#[derive(Clone)]
pub struct SingleVertexResolver {
    base: BaseTraversal,
    filter: Option<Arc<dyn TraversalFilter>>,
    selection: Selection,
}

impl SingleVertexResolver {
    pub fn new<B>(base: B) -> Self
    where
        B: Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync + 'static,
    {
        Self {
            base: base_arc(base),
            filter: None,
            selection: selection_arc(),
        }
    }

    /// Also narrows by the `input` argument.
    pub fn with_filter<F: TraversalFilter + 'static>(mut self, filter: F) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_selection<S>(mut self, selection: S) -> Self
    where
        S: Fn(Traversal) -> Traversal + Send + Sync + 'static,
    {
        self.selection = Arc::new(selection);
        self
    }
}

#[async_trait]
impl Resolver for SingleVertexResolver {
    async fn resolve(&self, source: &TraversalSource, input: &ResolverInput) -> Result<Value, ResolverError> {
        let mut traversal = (self.base)(source.g(), input)?;
        if let Some(filter) = &self.filter {
            traversal = filter.apply(traversal, &input.filter_input()?)?;
        }
        let selected = (self.selection)(traversal);

        Ok(source
            .try_next(&selected)
            .await?
            .map(|record| format_record(&record))
            .unwrap_or(Value::Null))
    }
}

/// Raw first value of the base traversal (counts, sums, flags).
#[derive(Clone)]
pub struct CalculatedFieldResolver {
    base: BaseTraversal,
}

impl CalculatedFieldResolver {
    pub fn new<B>(base: B) -> Self
    where
        B: Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync + 'static,
    {
        Self { base: base_arc(base) }
    }
}

#[async_trait]
impl Resolver for CalculatedFieldResolver {
    async fn resolve(&self, source: &TraversalSource, input: &ResolverInput) -> Result<Value, ResolverError> {
        let traversal = (self.base)(source.g(), input)?;
        match source.try_next(&traversal).await? {
            Some(value) => Ok(value.to_json()),
            None => Err(ResolverError::NoResult(input.key())),
        }
    }
}

/// Write traversal returning exactly one formatted element.
#[derive(Clone)]
pub struct MutationResolver {
    base: BaseTraversal,
    selection: Selection,
}

impl MutationResolver {
    pub fn new<B>(base: B) -> Self
    where
        B: Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync + 'static,
    {
        Self {
            base: base_arc(base),
            selection: selection_arc(),
        }
    }

    pub fn with_selection<S>(mut self, selection: S) -> Self
    where
        S: Fn(Traversal) -> Traversal + Send + Sync + 'static,
    {
        self.selection = Arc::new(selection);
        self
    }
}

#[async_trait]
impl Resolver for MutationResolver {
    async fn resolve(&self, source: &TraversalSource, input: &ResolverInput) -> Result<Value, ResolverError> {
        let traversal = (self.selection)((self.base)(source.g(), input)?);
        match source.try_next(&traversal).await? {
            Some(record) => Ok(format_record(&record)),
            None => Err(ResolverError::NotFound(input.key())),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
