// Graph access layer
//
// Traversals are plain values built with `g` / `__`; a `ConnectionProvider` turns
// them into results, either over HTTP (Gremlin script + GraphSON) or in memory.

pub mod value;
pub mod predicate;
pub mod traversal;
pub mod script;
pub mod graphson;
pub mod connection;
pub mod memory;

pub use value::{isoformat, Edge, ElementId, GKey, GMap, GValue, Vertex, T};
pub use predicate::P;
pub use traversal::{GraphTraversalSource, Step, Traversal, __};
pub use connection::{ConnectionProvider, GraphConnection, HttpConnection, HttpConnectionProvider, TraversalSource};
pub use memory::{MemoryConnection, MemoryConnectionProvider, MemoryGraph};
