// Resolvers served by the invocation server: a small social graph of users
// who follow each other and write posts.

use graphsync_common::config::FilterConfig;
use graphsync_core::filter::{FilterSchema, Relationship, ScalarKind, VertexFilter};
use graphsync_core::graph::{ElementId, GValue, MemoryGraph, P, T, __};
use graphsync_core::resolver::{CalculatedFieldResolver, MutationResolver, SingleVertexResolver, VertexListResolver};
use graphsync_core::{GraphError, ResolverRegistry};
use std::sync::Arc;

pub const USER: &str = "User";
pub const POST: &str = "Post";
pub const FOLLOWS: &str = "FOLLOWS";
pub const WROTE: &str = "WROTE";

pub fn filters(config: &FilterConfig) -> Result<Arc<FilterSchema>, anyhow::Error> {
    let schema = FilterSchema::builder()
        .config(config)
        .vertex(
            VertexFilter::new(USER, USER)
                .scalar("id", ScalarKind::Id)
                .scalar("name", ScalarKind::String)
                .scalar("age", ScalarKind::Int)
                .scalar("active", ScalarKind::Boolean)
                .scalar("created_at", ScalarKind::DateTime)
                .relationship("following", Relationship::out(FOLLOWS), USER)
                .relationship("followers", Relationship::in_(FOLLOWS), USER)
                .relationship("posts", Relationship::out(WROTE), POST),
        )
        .vertex(
            VertexFilter::new(POST, POST)
                .scalar("id", ScalarKind::Id)
                .scalar("title", ScalarKind::String)
                .scalar("likes", ScalarKind::Int)
                .relationship("author", Relationship::in_(WROTE), USER),
        )
        .build()?;
    Ok(Arc::new(schema))
}

pub fn registry(config: &FilterConfig) -> Result<ResolverRegistry, anyhow::Error> {
    let filters = filters(config)?;
    let mut registry = ResolverRegistry::new();

    registry
        .register(
            ("Query", "users"),
            VertexListResolver::new(filters.filter(USER)?, |g, _| Ok(g.v())),
        )
        .register(
            ("Query", "posts"),
            VertexListResolver::new(filters.filter(POST)?, |g, _| Ok(g.v())),
        )
        .register(
            ("Query", "user"),
            SingleVertexResolver::new(|g, input| {
                let id: String = input.argument("id")?;
                Ok(g.v().has_label(USER).has(T::Id, P::eq(id)))
            }),
        )
        .register(
            ("User", "following"),
            VertexListResolver::new(filters.filter(USER)?, |g, input| {
                let id: String = input.source_field("id")?;
                Ok(g.v_ids([id]).out(FOLLOWS))
            }),
        )
        .register(
            ("User", "posts"),
            VertexListResolver::new(filters.filter(POST)?, |g, input| {
                let id: String = input.source_field("id")?;
                Ok(g.v_ids([id]).out(WROTE))
            })
            .without_pagination(),
        )
        .register(
            ("User", "follower_count"),
            CalculatedFieldResolver::new(|g, input| {
                let id: String = input.source_field("id")?;
                Ok(g.v_ids([id]).in_(FOLLOWS).count())
            }),
        )
        .register(
            ("Mutation", "createUser"),
            MutationResolver::new(|g, input| {
                let name: String = input.argument("name")?;
                let mut traversal = g
                    .add_v(USER)
                    .property(T::Id, ElementId::new_random())
                    .property("name", name)
                    .property("active", true);
                if let Some(age) = input.optional_argument::<i64>("age")? {
                    traversal = traversal.property("age", age);
                }
                Ok(traversal)
            }),
        )
        .register(
            ("Mutation", "follow"),
            MutationResolver::new(|g, input| {
                let follower: String = input.argument("follower_id")?;
                let followee: String = input.argument("followee_id")?;
                Ok(g.v_ids([follower]).add_e(FOLLOWS).to(__::v([followee])).in_v())
            }),
        );

    Ok(registry)
}

/// Sample data for the in-memory backend.
pub fn seed(graph: &mut MemoryGraph) -> Result<(), GraphError> {
    let users = [
        ("u1", "Ann", 31, true),
        ("u2", "Bob", 17, true),
        ("u3", "Cid", 45, false),
        ("u4", "Ada", 22, true),
    ];
    for (id, name, age, active) in users {
        graph.add_vertex(
            id,
            USER,
            [
                ("name", GValue::from(name)),
                ("age", GValue::from(age)),
                ("active", GValue::from(active)),
            ],
        )?;
    }

    graph.add_vertex("p1", POST, [("title", GValue::from("Rust tips")), ("likes", GValue::from(12))])?;
    graph.add_vertex("p2", POST, [("title", GValue::from("Graph walks")), ("likes", GValue::from(3))])?;

    for (from, to) in [("u1", "u2"), ("u3", "u1"), ("u4", "u3"), ("u2", "u1")] {
        graph.add_edge(FOLLOWS, from, to)?;
    }
    graph.add_edge(WROTE, "u3", "p1")?;
    graph.add_edge(WROTE, "u1", "p2")?;

    tracing::info!(
        "Seeded in-memory graph with {} vertices and {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    Ok(())
}
