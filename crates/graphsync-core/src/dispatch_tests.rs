use super::*;
use crate::error::{FilterError, GraphError, ResolverError};
use crate::filter::{FilterSchema, ScalarKind, VertexFilter};
use crate::graph::{GValue, GraphConnection, MemoryConnectionProvider, MemoryGraph, Traversal, P, T};
use crate::resolver::{CalculatedFieldResolver, SingleVertexResolver, VertexListResolver};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    open: AtomicUsize,
}

struct CountingProvider {
    inner: MemoryConnectionProvider,
    counters: Arc<Counters>,
}

struct CountingConnection {
    inner: Box<dyn GraphConnection>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ConnectionProvider for CountingProvider {
    async fn connect(&self) -> Result<Box<dyn GraphConnection>, GraphError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingConnection {
            inner: self.inner.connect().await?,
            counters: self.counters.clone(),
        }))
    }
}

#[async_trait]
impl GraphConnection for CountingConnection {
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<GValue>, GraphError> {
        self.inner.submit(traversal).await
    }
}

impl Drop for CountingConnection {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl InvocationSink for Arc<RecordingSink> {
    fn record_input(&self, input: &ResolverInput) {
        self.events.lock().unwrap().push(format!("input {}", input.key()));
    }

    fn record_result(&self, key: &ResolverKey, result: &Value) {
        self.events.lock().unwrap().push(format!("result {} {}", key, result));
    }
}

fn registry() -> ResolverRegistry {
    let schema = FilterSchema::builder()
        .vertex(
            VertexFilter::new("User", "User")
                .scalar("name", ScalarKind::String)
                .scalar("age", ScalarKind::Int),
        )
        .build()
        .unwrap();
    let users = Arc::new(schema).filter("User").unwrap();

    ResolverRegistry::new()
        .with(("Query", "users"), VertexListResolver::new(users, |g, _| Ok(g.v())))
        .with(
            ("Query", "user"),
            SingleVertexResolver::new(|g, input| {
                let id: String = input.argument("id")?;
                Ok(g.v().has_label("User").has(T::Id, P::eq(id)))
            }),
        )
        .with(
            ("Query", "user_count"),
            CalculatedFieldResolver::new(|g, _| Ok(g.v().has_label("User").count())),
        )
}

fn setup() -> (Dispatcher, Arc<Counters>) {
    setup_with(registry())
}

fn setup_with(registry: ResolverRegistry) -> (Dispatcher, Arc<Counters>) {
    let mut graph = MemoryGraph::new();
    graph.add_vertex("u1", "User", [("name", GValue::from("Ann")), ("age", GValue::from(31))]).unwrap();
    graph.add_vertex("u2", "User", [("name", GValue::from("Bob")), ("age", GValue::from(17))]).unwrap();

    let counters = Arc::new(Counters::default());
    let provider = CountingProvider {
        inner: MemoryConnectionProvider::new(graph),
        counters: counters.clone(),
    };
    (Dispatcher::new(registry, Arc::new(provider)), counters)
}

fn event(field: &str, arguments: Value) -> Value {
    json!({"type_name": "Query", "field_name": field, "arguments": arguments, "identity": null, "source": null})
}

#[tokio::test]
async fn test_single_invocation() {
    let (dispatcher, counters) = setup();

    let result = dispatcher.handle(event("user", json!({"id": "u2"}))).await.unwrap();
    assert_eq!(result, json!({"id": "u2", "__typename": "User", "name": "Bob", "age": 17}));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.open.load(Ordering::SeqCst), 0);

    let missing = dispatcher.handle(event("user", json!({"id": "u9"}))).await.unwrap();
    assert_eq!(missing, Value::Null);
}

#[tokio::test]
async fn test_appsync_info_payload() {
    let (dispatcher, _) = setup();
    let payload = json!({
        "arguments": {},
        "info": {"parentTypeName": "Query", "fieldName": "user_count"}
    });
    assert_eq!(dispatcher.handle(payload).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_unregistered_fails_before_connecting() {
    let (dispatcher, counters) = setup();

    let err = dispatcher.handle(event("posts", json!({}))).await.unwrap_err();
    assert!(matches!(err, DispatchError::Unregistered(ref key) if key.field_name == "posts"));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);

    let envelope = dispatcher.invoke(event("posts", json!({}))).await.unwrap_err();
    assert_eq!(envelope.error_type, "UnregisteredResolver");
    assert_eq!(envelope.data["type_name"], json!("Query"));
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_payload() {
    let (dispatcher, counters) = setup();

    let err = dispatcher.handle(json!({"arguments": {}})).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidPayload(_)));

    let envelope = dispatcher.invoke(json!("not an event")).await.unwrap_err();
    assert_eq!(envelope.error_type, "InvalidPayload");
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_results_in_order() {
    let (dispatcher, counters) = setup();
    let batch = json!([
        event("user_count", json!({})),
        event("user", json!({"id": "u1"})),
        event("user", json!({"id": "nope"})),
    ]);

    let results = dispatcher.handle(batch).await.unwrap();
    assert_eq!(results[0], json!(2));
    assert_eq!(results[1]["name"], json!("Ann"));
    assert_eq!(results[2], Value::Null);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
    assert_eq!(counters.open.load(Ordering::SeqCst), 0);

    assert_eq!(dispatcher.handle(json!([])).await.unwrap(), json!([]));
}

#[tokio::test]
async fn test_batch_aborts_on_first_failure() {
    let (dispatcher, counters) = setup();
    let batch = json!([
        event("user_count", json!({})),
        event("users", json!({"input": {"age": {"between": [1, 2]}}})),
        event("user_count", json!({})),
    ]);

    let err = dispatcher.handle(batch.clone()).await.unwrap_err();
    match err {
        DispatchError::Resolver { ref key, source: ResolverError::Filter(FilterError::UnknownOperator { ref operator, .. }) } => {
            assert_eq!(key.field_name, "users");
            assert_eq!(operator, "between");
        }
        other => panic!("unexpected error: {}", other),
    }
    // Third element never ran; every opened connection was released.
    assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    assert_eq!(counters.open.load(Ordering::SeqCst), 0);

    let envelope = dispatcher.invoke(batch).await.unwrap_err();
    assert_eq!(envelope.error_type, "UnknownOperator");
    assert_eq!(envelope.data["operator"], json!("between"));
    assert_eq!(envelope.data["kind"], json!("int"));
}

#[tokio::test]
async fn test_sink_sees_input_and_result() {
    let (dispatcher, _) = setup();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = dispatcher.with_sink(sink.clone());

    dispatcher.handle(event("user_count", json!({}))).await.unwrap();
    assert_eq!(
        *sink.events.lock().unwrap(),
        vec!["input Query.user_count".to_string(), "result Query.user_count 2".to_string()]
    );
}

#[tokio::test]
async fn test_last_registration_wins() {
    let mut registry = registry();
    assert_eq!(registry.len(), 3);

    registry.register(
        ("Query", "user_count"),
        CalculatedFieldResolver::new(|g, _| Ok(g.v().count().constant(99))),
    );
    assert_eq!(registry.len(), 3);
    assert_eq!(
        registry.keys(),
        vec![
            ResolverKey::new("Query", "user"),
            ResolverKey::new("Query", "user_count"),
            ResolverKey::new("Query", "users"),
        ]
    );

    let (dispatcher, _) = setup_with(registry);
    assert_eq!(dispatcher.handle(event("user_count", json!({}))).await.unwrap(), json!(99));
}
