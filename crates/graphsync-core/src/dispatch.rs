// Invocation dispatch
// Routes each (type, field) invocation to its registered resolver, one fresh
// graph connection per invocation.

use crate::error::DispatchError;
use crate::graph::{ConnectionProvider, TraversalSource};
use crate::resolver::Resolver;
use graphsync_common::config::DispatchConfig;
use graphsync_common::{ErrorEnvelope, ResolverInput, ResolverKey};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Observes every invocation that reaches a resolver.
pub trait InvocationSink: Send + Sync {
    fn record_input(&self, input: &ResolverInput);
    fn record_result(&self, key: &ResolverKey, result: &Value);
}

/// Logs inputs and results at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl InvocationSink for TracingSink {
    fn record_input(&self, input: &ResolverInput) {
        match serde_json::to_string(input) {
            Ok(json) => tracing::debug!("Resolver input for {}: {}", input.key(), json),
            Err(e) => tracing::debug!("Resolver input for {} not serializable: {}", input.key(), e),
        }
    }

    fn record_result(&self, key: &ResolverKey, result: &Value) {
        tracing::debug!("Resolver result for {}: {}", key, result);
    }
}

/// `(type, field)` → resolver. Filled at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<ResolverKey, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver. A second registration for the same pair replaces the first.
    pub fn register<R>(&mut self, key: impl Into<ResolverKey>, resolver: R) -> &mut Self
    where
        R: Resolver + 'static,
    {
        self.register_arc(key, Arc::new(resolver))
    }

    pub fn register_arc(&mut self, key: impl Into<ResolverKey>, resolver: Arc<dyn Resolver>) -> &mut Self {
        let key = key.into();
        if self.resolvers.insert(key.clone(), resolver).is_some() {
            tracing::warn!("Resolver for {} registered twice; keeping the latest", key);
        } else {
            tracing::info!("Registered resolver {}", key);
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<R>(mut self, key: impl Into<ResolverKey>, resolver: R) -> Self
    where
        R: Resolver + 'static,
    {
        self.register(key, resolver);
        self
    }

    pub fn get(&self, key: &ResolverKey) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(key).cloned()
    }

    pub fn contains(&self, key: &ResolverKey) -> bool {
        self.resolvers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Registered pairs, sorted for stable output.
    pub fn keys(&self) -> Vec<ResolverKey> {
        let mut keys: Vec<ResolverKey> = self.resolvers.keys().cloned().collect();
        keys.sort_by(|a, b| (&a.type_name, &a.field_name).cmp(&(&b.type_name, &b.field_name)));
        keys
    }
}

/// Entry point for invocation payloads.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ResolverRegistry>,
    provider: Arc<dyn ConnectionProvider>,
    sink: Option<Arc<dyn InvocationSink>>,
}

impl Dispatcher {
    pub fn new(registry: ResolverRegistry, provider: Arc<dyn ConnectionProvider>) -> Self {
        tracing::info!("Dispatcher ready with {} resolvers", registry.len());
        Self {
            registry: Arc::new(registry),
            provider,
            sink: None,
        }
    }

    pub fn with_sink<S: InvocationSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Installs [`TracingSink`] when payload logging is enabled.
    pub fn with_config(self, config: &DispatchConfig) -> Self {
        if config.log_payloads {
            self.with_sink(TracingSink)
        } else {
            self
        }
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Handles a single event or a batch (JSON array). Batch elements run in
    /// order and the first failure aborts the whole batch.
    pub async fn handle(&self, payload: Value) -> Result<Value, DispatchError> {
        match payload {
            Value::Array(events) => {
                tracing::debug!("Dispatching batch of {} invocations", events.len());
                let mut results = Vec::with_capacity(events.len());
                for (index, event) in events.into_iter().enumerate() {
                    match self.process(event).await {
                        Ok(result) => results.push(result),
                        Err(e) => {
                            tracing::warn!("Batch aborted at element {}: {}", index, e);
                            return Err(e);
                        }
                    }
                }
                Ok(Value::Array(results))
            }
            event => self.process(event).await,
        }
    }

    /// [`handle`](Self::handle), with failures converted to the error envelope.
    pub async fn invoke(&self, payload: Value) -> Result<Value, ErrorEnvelope> {
        self.handle(payload).await.map_err(|e| {
            tracing::error!("Invocation failed ({}): {}", e.error_type(), e);
            e.to_envelope()
        })
    }

    async fn process(&self, event: Value) -> Result<Value, DispatchError> {
        let input = ResolverInput::from_event(event).map_err(DispatchError::InvalidPayload)?;
        self.dispatch(&input).await
    }

    /// Resolves one normalized invocation.
    pub async fn dispatch(&self, input: &ResolverInput) -> Result<Value, DispatchError> {
        let key = input.key();
        let resolver = self
            .registry
            .get(&key)
            .ok_or_else(|| DispatchError::Unregistered(key.clone()))?;

        tracing::debug!("Dispatching {}", key);
        let source = TraversalSource::new(self.provider.connect().await.map_err(DispatchError::Connection)?);

        if let Some(sink) = &self.sink {
            sink.record_input(input);
        }
        let result = resolver
            .resolve(&source, input)
            .await
            .map_err(|source| DispatchError::Resolver { key: key.clone(), source })?;
        if let Some(sink) = &self.sink {
            sink.record_result(&key, &result);
        }

        Ok(result)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
