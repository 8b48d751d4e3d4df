// Filter composition
//
// Nested filter inputs become traversal fragments: scalar fields add `has`
// steps, relationship fields add an existential `where(out|in(label)...)`.

pub mod catalog;
pub mod scalar;
pub mod relationship;
pub mod vertex;
pub mod schema;

pub use catalog::{Operator, ScalarKind};
pub use scalar::{ScalarFilter, UntypedFilter};
pub use relationship::{Relationship, RelationshipDirection, RelationshipFilter};
pub use vertex::{Filter, VertexFilter};
pub use schema::{FilterContext, FilterSchema, FilterSchemaBuilder, NamedFilter};

use crate::error::FilterError;
use crate::graph::Traversal;
use graphsync_common::FilterInput;

/// Narrows a traversal according to a filter input. Implementations hold no
/// per-call state.
pub trait TraversalFilter: Send + Sync {
    fn apply(&self, traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError>;
}

impl<F> TraversalFilter for F
where
    F: Fn(Traversal, &FilterInput) -> Result<Traversal, FilterError> + Send + Sync,
{
    fn apply(&self, traversal: Traversal, input: &FilterInput) -> Result<Traversal, FilterError> {
        self(traversal, input)
    }
}
