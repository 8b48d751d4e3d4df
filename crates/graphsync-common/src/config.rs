use serde::{Deserialize, Serialize};
use std::env;
use config::{Config, ConfigBuilder, ConfigError, File, Environment};
use config::builder::DefaultState;

// --- Constants for Default Configuration ---
pub const DEFAULT_GRAPH_PROTOCOL: &str = "https";
pub const DEFAULT_GRAPH_HOST: &str = "localhost";
pub const DEFAULT_GRAPH_PORT: u16 = 8182;
pub const DEFAULT_GRAPH_PATH: &str = "/gremlin";
pub const DEFAULT_GRAPH_TIMEOUT_MS: u64 = 30000;

pub const DEFAULT_FILTER_MAX_DEPTH: usize = 8;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 9000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Gremlin server reached over HTTP (Neptune, JanusGraph, TinkerPop server).
    Remote,
    /// Process-local graph, for tests and local development.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout_ms: u64,
}

impl GraphConfig {
    /// Endpoint the HTTP provider posts scripts to, e.g. `https://host:8182/gremlin`.
    pub fn endpoint(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.protocol, self.host, self.port, path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Maximum nesting of relationship filters inside one filter input.
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Emit every resolver input and result to the invocation sink.
    pub log_payloads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub filter: FilterConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Remote,
            protocol: DEFAULT_GRAPH_PROTOCOL.into(),
            host: DEFAULT_GRAPH_HOST.into(),
            port: DEFAULT_GRAPH_PORT,
            path: DEFAULT_GRAPH_PATH.into(),
            timeout_ms: DEFAULT_GRAPH_TIMEOUT_MS,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_FILTER_MAX_DEPTH,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { log_payloads: false }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.into(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            filter: FilterConfig::default(),
            dispatch: DispatchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Self::defaults()?
            // File: graphsync.toml
            .add_source(File::with_name("graphsync").required(false))

            // Environment: GRAPHSYNC__GRAPH__HOST=db.local -> graph.host=db.local
            .add_source(Environment::with_prefix("GRAPHSYNC").separator("__"))

            // Legacy Neptune connection variables
            .set_override_option("graph.protocol", env::var("CONNECTION_METHOD").ok())?
            .set_override_option("graph.host", env::var("NEPTUNE_CLUSTER_ENDPOINT").ok())?
            .set_override_option("graph.port", env::var("NEPTUNE_CLUSTER_PORT").ok().and_then(|v| v.parse::<u16>().ok()).map(u64::from))?

            .build()?;

        s.try_deserialize()
    }

    /// Builder pre-filled with every default, so partial sources deserialize.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("graph.backend", "remote")?
            .set_default("graph.protocol", DEFAULT_GRAPH_PROTOCOL)?
            .set_default("graph.host", DEFAULT_GRAPH_HOST)?
            .set_default("graph.port", DEFAULT_GRAPH_PORT as i64)?
            .set_default("graph.path", DEFAULT_GRAPH_PATH)?
            .set_default("graph.timeout_ms", DEFAULT_GRAPH_TIMEOUT_MS)?
            .set_default("filter.max_depth", DEFAULT_FILTER_MAX_DEPTH as i64)?
            .set_default("dispatch.log_payloads", false)?
            .set_default("server.host", DEFAULT_SERVER_HOST)?
            .set_default("server.port", DEFAULT_SERVER_PORT as i64)
    }

    pub fn is_in_memory(&self) -> bool {
        self.graph.backend == GraphBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let config: AppConfig = AppConfig::defaults()
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("Failed to build default config");

        assert_eq!(config.graph.backend, GraphBackend::Remote);
        assert_eq!(config.graph.port, DEFAULT_GRAPH_PORT);
        assert_eq!(config.filter.max_depth, DEFAULT_FILTER_MAX_DEPTH);
        assert!(!config.dispatch.log_payloads);
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_overrides_apply() {
        let config: AppConfig = AppConfig::defaults()
            .and_then(|b| b.set_override("graph.backend", "memory"))
            .and_then(|b| b.set_override("graph.host", "neptune.cluster.local"))
            .and_then(|b| b.set_override("graph.protocol", "wss"))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("Failed to build overridden config");

        assert!(config.is_in_memory());
        assert_eq!(config.graph.endpoint(), "wss://neptune.cluster.local:8182/gremlin");
    }

    #[test]
    fn test_endpoint_normalizes_path() {
        let mut graph = GraphConfig::default();
        graph.path = "gremlin".into();
        assert_eq!(graph.endpoint(), "https://localhost:8182/gremlin");
    }
}
