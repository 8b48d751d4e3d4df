pub mod format;
pub mod pipeline;

pub use format::{format_key, format_record, format_value, format_value_map, TYPENAME_KEY};
pub use pipeline::{
    default_selection, CalculatedFieldResolver, MutationResolver, SingleVertexResolver, VertexListResolver,
};

use crate::error::ResolverError;
use crate::graph::{GraphTraversalSource, Traversal, TraversalSource};
use async_trait::async_trait;
use graphsync_common::ResolverInput;
use serde_json::Value;
use std::sync::Arc;

/// Produces the JSON result of one GraphQL field.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, source: &TraversalSource, input: &ResolverInput) -> Result<Value, ResolverError>;
}

/// Caller-supplied start of a resolver: builds the base traversal from `g`
/// and the invocation.
pub type BaseTraversal = Arc<dyn Fn(&GraphTraversalSource, &ResolverInput) -> Result<Traversal, ResolverError> + Send + Sync>;

/// Turns filtered elements into the records a resolver returns.
pub type Selection = Arc<dyn Fn(Traversal) -> Traversal + Send + Sync>;
