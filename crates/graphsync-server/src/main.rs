use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use graphsync_common::config::{AppConfig, GraphBackend};
use graphsync_core::{ConnectionProvider, Dispatcher, HttpConnectionProvider, MemoryConnectionProvider, MemoryGraph};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

mod schema;

/// Path the Lambda runtime interface emulator exposes for invocations.
const INVOCATION_PATH: &str = "/2015-03-31/functions/function/invocations";

struct AppState {
    dispatcher: Dispatcher,
    backend: GraphBackend,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("Loaded .env from: {:?}", path),
        Err(e) => tracing::warn!("Failed to load .env file: {}. Using system environment variables.", e),
    }

    let config = AppConfig::load().expect("Failed to load configuration");
    tracing::info!("Using graph backend: {:?}", config.graph.backend);

    let provider = build_provider(&config).expect("Failed to initialize graph provider");
    let registry = schema::registry(&config.filter).expect("Failed to build resolver registry");
    let dispatcher = Dispatcher::new(registry, provider).with_config(&config.dispatch);

    let state = Arc::new(AppState {
        dispatcher,
        backend: config.graph.backend,
    });
    let app = router(state);

    let http_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server host/port");
    tracing::info!("Invocation endpoint: http://{}{}", http_addr, INVOCATION_PATH);
    let listener = tokio::net::TcpListener::bind(http_addr).await.unwrap();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            tracing::info!("Shutdown signal received.");
        })
        .await
        .unwrap();

    tracing::info!("Graphsync Server stopped.");
}

fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn ConnectionProvider>> {
    match config.graph.backend {
        GraphBackend::Remote => {
            let provider = HttpConnectionProvider::from_config(&config.graph);
            tracing::info!("Submitting traversals to {}", provider.endpoint());
            Ok(Arc::new(provider))
        }
        GraphBackend::Memory => {
            let mut graph = MemoryGraph::new();
            schema::seed(&mut graph)?;
            Ok(Arc::new(MemoryConnectionProvider::new(graph)))
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/version", get(version))
        .route(INVOCATION_PATH, post(invoke))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Graphsync is running."
}

async fn version(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
        "backend": state.backend,
        "resolvers": state.dispatcher.registry().keys(),
    }))
}

/// Runs one invocation payload (single event or batch). Failures come back as
/// the error envelope with a 500.
async fn invoke(State(state): State<Arc<AppState>>, Json(payload): Json<Value>) -> axum::response::Response {
    match state.dispatcher.invoke(payload).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(envelope) => (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use graphsync_common::config::FilterConfig;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut graph = MemoryGraph::new();
        schema::seed(&mut graph).unwrap();
        let registry = schema::registry(&FilterConfig::default()).unwrap();
        let dispatcher = Dispatcher::new(registry, Arc::new(MemoryConnectionProvider::new(graph)));
        router(Arc::new(AppState {
            dispatcher,
            backend: GraphBackend::Memory,
        }))
    }

    async fn post_invocation(app: Router, payload: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(INVOCATION_PATH)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn event(type_name: &str, field_name: &str, arguments: Value, source: Value) -> Value {
        json!({
            "type_name": type_name,
            "field_name": field_name,
            "arguments": arguments,
            "identity": null,
            "source": source
        })
    }

    #[tokio::test]
    async fn test_root() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_paginated_query() {
        let payload = event(
            "Query",
            "users",
            json!({"input": {"active": {"eq": true}, "followers": {"name": {"eq": "Cid"}}}, "pagination": {"per_page": 5}}),
            Value::Null,
        );
        let (status, body) = post_invocation(test_app(), payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["data"][0]["id"], json!("u1"));
        assert_eq!(body["data"][0]["__typename"], json!("User"));
    }

    #[tokio::test]
    async fn test_nested_field_batch() {
        let ann = json!({"id": "u1", "name": "Ann"});
        let payload = json!([
            event("User", "follower_count", json!({}), ann.clone()),
            event("User", "posts", json!({}), ann.clone()),
        ]);
        let (status, body) = post_invocation(test_app(), payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0], json!(2));
        assert_eq!(body[1][0]["title"], json!("Graph walks"));
    }

    #[tokio::test]
    async fn test_mutation_then_query() {
        let app = test_app();

        let follow = event(
            "Mutation",
            "follow",
            json!({"follower_id": "u4", "followee_id": "u2"}),
            Value::Null,
        );
        let (status, body) = post_invocation(app.clone(), follow).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("u2"));

        let count = event("User", "follower_count", json!({}), json!({"id": "u2"}));
        let (_, body) = post_invocation(app, count).await;
        assert_eq!(body, json!(2));
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let payload = event("Query", "users", json!({"input": {"age": {"between": 3}}}), Value::Null);
        let (status, body) = post_invocation(test_app(), payload).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_type"], json!("UnknownOperator"));
        assert_eq!(body["data"]["field_name"], json!("users"));

        let (status, body) = post_invocation(test_app(), event("Query", "comments", json!({}), Value::Null)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_type"], json!("UnregisteredResolver"));
    }
}
