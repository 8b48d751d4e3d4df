use super::graphson;
use super::script;
use super::traversal::{GraphTraversalSource, Traversal};
use super::value::GValue;
use crate::error::GraphError;
use async_trait::async_trait;
use graphsync_common::config::GraphConfig;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// An open session against a graph backend.
#[async_trait]
pub trait GraphConnection: Send + Sync {
    /// Executes a root traversal and returns every result it emits.
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<GValue>, GraphError>;
}

/// Hands out one fresh connection per resolver invocation.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn GraphConnection>, GraphError>;
}

/// `g` bound to a live connection. Dropping it releases the connection.
pub struct TraversalSource {
    g: GraphTraversalSource,
    connection: Box<dyn GraphConnection>,
}

impl TraversalSource {
    pub fn new(connection: Box<dyn GraphConnection>) -> Self {
        Self {
            g: GraphTraversalSource::new(),
            connection,
        }
    }

    pub fn g(&self) -> &GraphTraversalSource {
        &self.g
    }

    pub async fn to_list(&self, traversal: &Traversal) -> Result<Vec<GValue>, GraphError> {
        self.connection.submit(traversal).await
    }

    /// First result of the traversal, if any.
    pub async fn try_next(&self, traversal: &Traversal) -> Result<Option<GValue>, GraphError> {
        let limited = traversal.clone().limit(1);
        Ok(self.connection.submit(&limited).await?.into_iter().next())
    }
}

/// Gremlin server reached over HTTP: scripts in, GraphSON v3 out.
pub struct HttpConnection {
    client: Client,
    endpoint: String,
}

impl HttpConnection {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl GraphConnection for HttpConnection {
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<GValue>, GraphError> {
        let gremlin = script::render(traversal);
        tracing::debug!("Submitting traversal to {}: {}", self.endpoint, gremlin);

        let response = self.client
            .post(&self.endpoint)
            .header("Accept", "application/vnd.gremlin-v3.0+json")
            .json(&json!({ "gremlin": gremlin }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Gremlin request failed: status={}", status);
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(GraphError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| GraphError::Decode(format!("{} - body: {}", e, body)))?;
        graphson::decode_response(&parsed)
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        tracing::debug!("Released graph connection to {}", self.endpoint);
    }
}

pub struct HttpConnectionProvider {
    endpoint: String,
    timeout: Duration,
}

impl HttpConnectionProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(config.endpoint(), Duration::from_millis(config.timeout_ms))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConnectionProvider for HttpConnectionProvider {
    async fn connect(&self) -> Result<Box<dyn GraphConnection>, GraphError> {
        let client = Client::builder().timeout(self.timeout).build()?;
        tracing::debug!("Opened graph connection to {}", self.endpoint);
        Ok(Box::new(HttpConnection::new(client, self.endpoint.clone())))
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
