use super::*;
use crate::filter::{FilterSchema, ScalarKind, VertexFilter};
use crate::graph::{ConnectionProvider, MemoryConnectionProvider, MemoryGraph, P, T};
use chrono::{TimeZone, Utc};
use graphsync_common::ArgumentError;
use serde_json::{json, Map};

fn user_filter() -> crate::filter::NamedFilter {
    let schema = FilterSchema::builder()
        .vertex(
            VertexFilter::new("User", "User")
                .scalar("id", ScalarKind::Id)
                .scalar("name", ScalarKind::String)
                .scalar("age", ScalarKind::Int),
        )
        .build()
        .unwrap();
    Arc::new(schema).filter("User").unwrap()
}

fn users(count: usize) -> MemoryConnectionProvider {
    let mut graph = MemoryGraph::new();
    let created = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
    for i in 0..count {
        graph
            .add_vertex(
                format!("u{:02}", i),
                "User",
                [
                    ("name", GValue::from(format!("user-{}", i))),
                    ("age", GValue::from(i as i64)),
                    ("created_at", GValue::Date(created)),
                ],
            )
            .unwrap();
    }
    graph.add_vertex("p1", "Post", [("title", GValue::from("hello"))]).unwrap();
    MemoryConnectionProvider::new(graph)
}

fn request(field: &str, arguments: Value) -> ResolverInput {
    let arguments: Map<String, Value> = arguments.as_object().cloned().unwrap_or_default();
    ResolverInput::new("Query", field, arguments, None, None)
}

async fn resolve(provider: &MemoryConnectionProvider, resolver: &dyn Resolver, input: &ResolverInput) -> Result<Value, ResolverError> {
    let source = TraversalSource::new(provider.connect().await.unwrap());
    resolver.resolve(&source, input).await
}

fn list_resolver() -> VertexListResolver {
    VertexListResolver::new(user_filter(), |g, _| Ok(g.v()))
}

#[tokio::test]
async fn test_pagination_window_and_total() {
    let provider = users(25);
    let resolver = list_resolver();

    let page3 = resolve(&provider, &resolver, &request("users", json!({"pagination": {"page": 3, "per_page": 10}})))
        .await
        .unwrap();
    assert_eq!(page3["page"], json!(3));
    assert_eq!(page3["per_page"], json!(10));
    assert_eq!(page3["total"], json!(3));
    assert_eq!(page3["data"].as_array().unwrap().len(), 5);
    assert_eq!(page3["data"][0]["id"], json!("u20"));

    let page4 = resolve(&provider, &resolver, &request("users", json!({"pagination": {"page": 4, "per_page": 10}})))
        .await
        .unwrap();
    assert_eq!(page4["data"], json!([]));
    assert_eq!(page4["total"], json!(3));
}

#[tokio::test]
async fn test_default_pagination_and_formatting() {
    let provider = users(12);
    let result = resolve(&provider, &list_resolver(), &request("users", json!({}))).await.unwrap();

    assert_eq!(result["page"], json!(1));
    assert_eq!(result["per_page"], json!(10));
    assert_eq!(result["total"], json!(2));
    assert_eq!(
        result["data"][0],
        json!({
            "id": "u00",
            "__typename": "User",
            "name": "user-0",
            "age": 0,
            "created_at": "2023-05-01T00:00:00"
        })
    );
}

#[tokio::test]
async fn test_filter_narrows_count() {
    let provider = users(25);
    let result = resolve(
        &provider,
        &list_resolver(),
        &request("users", json!({"input": {"age": {"ge": 20}}, "pagination": {"per_page": 2}})),
    )
    .await
    .unwrap();

    assert_eq!(result["total"], json!(3));
    assert_eq!(result["data"][1]["age"], json!(21));
}

#[tokio::test]
async fn test_list_errors() {
    let provider = users(3);

    let err = resolve(&provider, &list_resolver(), &request("users", json!({"input": {"age": {"between": 1}}})))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Filter(crate::error::FilterError::UnknownOperator { .. })));

    let err = resolve(&provider, &list_resolver(), &request("users", json!({"pagination": {"page": 0}})))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Argument(ArgumentError::InvalidPagination(_))));
}

#[tokio::test]
async fn test_unpaginated_list() {
    let provider = users(3);
    let resolver = list_resolver().without_pagination();
    let result = resolve(&provider, &resolver, &request("users", json!({"input": {"age": {"lt": 2}}}))).await.unwrap();

    let ids: Vec<&str> = result.as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["u00", "u01"]);
}

#[tokio::test]
async fn test_single_vertex_found_and_missing() {
    let provider = users(3);
    let resolver = SingleVertexResolver::new(|g, input| {
        let id: String = input.argument("id")?;
        Ok(g.v().has_label("User").has(T::Id, P::eq(id)))
    });

    let found = resolve(&provider, &resolver, &request("user", json!({"id": "u01"}))).await.unwrap();
    assert_eq!(found["name"], json!("user-1"));
    assert_eq!(found["__typename"], json!("User"));

    let missing = resolve(&provider, &resolver, &request("user", json!({"id": "nope"}))).await.unwrap();
    assert_eq!(missing, Value::Null);

    let err = resolve(&provider, &resolver, &request("user", json!({}))).await.unwrap_err();
    assert!(matches!(err, ResolverError::Argument(ArgumentError::Missing(_))));
}

#[tokio::test]
async fn test_single_vertex_with_filter() {
    let provider = users(5);
    let resolver = SingleVertexResolver::new(|g, _| Ok(g.v())).with_filter(user_filter());

    let found = resolve(&provider, &resolver, &request("oldest", json!({"input": {"age": {"gt": 3}}}))).await.unwrap();
    assert_eq!(found["id"], json!("u04"));
}

#[tokio::test]
async fn test_calculated_field() {
    let provider = users(7);
    let count = CalculatedFieldResolver::new(|g, _| Ok(g.v().has_label("User").count()));
    assert_eq!(resolve(&provider, &count, &request("user_count", json!({}))).await.unwrap(), json!(7));

    let missing = CalculatedFieldResolver::new(|g, _| Ok(g.v_ids(["nope"]).values("age")));
    let err = resolve(&provider, &missing, &request("age", json!({}))).await.unwrap_err();
    assert!(matches!(err, ResolverError::NoResult(ref key) if key.field_name == "age"));
}

#[tokio::test]
async fn test_mutation() {
    let provider = users(1);
    let create = MutationResolver::new(|g, input| {
        let name: String = input.argument("name")?;
        Ok(g.add_v("User").property(T::Id, "u99").property("name", name))
    });
    let created = resolve(&provider, &create, &request("createUser", json!({"name": "Zed"}))).await.unwrap();
    assert_eq!(created, json!({"id": "u99", "__typename": "User", "name": "Zed"}));

    let rename = MutationResolver::new(|g, input| {
        let id: String = input.argument("id")?;
        Ok(g.v_ids([id]).property("name", "renamed"))
    });
    let err = resolve(&provider, &rename, &request("renameUser", json!({"id": "missing"}))).await.unwrap_err();
    assert!(matches!(err, ResolverError::NotFound(_)));
}
