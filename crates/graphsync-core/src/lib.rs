pub mod error;
pub mod graph;
pub mod filter;
pub mod resolver;
pub mod dispatch;

pub use dispatch::{Dispatcher, InvocationSink, ResolverRegistry, TracingSink};
pub use error::{DispatchError, FilterError, GraphError, ResolverError};
pub use filter::{FilterSchema, Relationship, ScalarKind, TraversalFilter, VertexFilter};
pub use graph::{ConnectionProvider, GraphConnection, HttpConnectionProvider, MemoryConnectionProvider, MemoryGraph, TraversalSource};
pub use resolver::{CalculatedFieldResolver, MutationResolver, Resolver, SingleVertexResolver, VertexListResolver};

// Re-export common types for convenience
pub use graphsync_common::{ErrorEnvelope, FilterInput, PaginatedResult, PaginationInfo, ResolverInput, ResolverKey};
