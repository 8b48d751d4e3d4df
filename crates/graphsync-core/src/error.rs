use crate::filter::ScalarKind;
use graphsync_common::{ArgumentError, ErrorEnvelope, ResolverKey};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("graph server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("undecodable graph response: {0}")]
    Decode(String),
    #[error("traversal evaluation failed: {0}")]
    Evaluation(String),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown operator `{operator}` for {kind} filter")]
    UnknownOperator { kind: ScalarKind, operator: String },
    #[error("unknown operator `{operator}` for field `{field}`")]
    UnknownUntypedOperator { field: String, operator: String },
    #[error("filter `{filter}` has no field `{field}`")]
    UnknownField { filter: String, field: String },
    #[error("no vertex filter named `{0}`")]
    UnknownFilter(String),
    #[error("expected an object for `{field}`, got {found}")]
    ExpectedObject { field: String, found: Value },
    #[error("invalid value for `{field}.{operator}`: {reason}")]
    InvalidValue { field: String, operator: String, reason: String },
    #[error("filter nesting exceeds the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("traversal for {0} produced no result")]
    NoResult(ResolverKey),
    #[error("{0} found nothing to return")]
    NotFound(ResolverKey),
    #[error("unexpected traversal result: {0}")]
    UnexpectedShape(String),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidPayload(ArgumentError),
    #[error("no resolver registered for {0}")]
    Unregistered(ResolverKey),
    #[error("could not open a graph connection: {0}")]
    Connection(#[source] GraphError),
    #[error("resolver {key} failed: {source}")]
    Resolver {
        key: ResolverKey,
        #[source]
        source: ResolverError,
    },
}

impl DispatchError {
    /// Stable classification used as `error_type` in the envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            DispatchError::InvalidPayload(_) => "InvalidPayload",
            DispatchError::Unregistered(_) => "UnregisteredResolver",
            DispatchError::Connection(_) => "ConnectionError",
            DispatchError::Resolver { source, .. } => match source {
                ResolverError::Argument(ArgumentError::InvalidPagination(_)) => "InvalidPagination",
                ResolverError::Argument(_) => "InvalidArgument",
                ResolverError::Filter(e) => match e {
                    FilterError::UnknownOperator { .. } | FilterError::UnknownUntypedOperator { .. } => {
                        "UnknownOperator"
                    }
                    FilterError::UnknownField { .. } => "UnknownFilterField",
                    FilterError::UnknownFilter(_) => "UnknownFilter",
                    FilterError::ExpectedObject { .. } => "InvalidFilter",
                    FilterError::InvalidValue { .. } => "InvalidFilterValue",
                    FilterError::DepthExceeded { .. } => "FilterDepthExceeded",
                },
                ResolverError::Graph(e) => graph_error_type(e),
                ResolverError::NoResult(_) => "NoResult",
                ResolverError::NotFound(_) => "NotFound",
                ResolverError::UnexpectedShape(_) => "UnexpectedResult",
                ResolverError::Custom(_) => "ResolverError",
            },
        }
    }

    /// Converts the failure into the uniform error shape returned to the caller.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.error_type(), self.to_string());

        match self {
            DispatchError::InvalidPayload(_) => {}
            DispatchError::Unregistered(key) => {
                envelope = with_key(envelope, key);
            }
            DispatchError::Connection(e) => {
                if let GraphError::Server { status, .. } = e {
                    envelope = envelope.with_data("status", *status);
                }
            }
            DispatchError::Resolver { key, source } => {
                envelope = with_key(envelope, key);
                match source {
                    ResolverError::Filter(FilterError::UnknownOperator { kind, operator }) => {
                        envelope = envelope
                            .with_data("kind", kind.to_string())
                            .with_data("operator", operator.as_str());
                    }
                    ResolverError::Filter(FilterError::UnknownUntypedOperator { field, operator }) => {
                        envelope = envelope
                            .with_data("field", field.as_str())
                            .with_data("operator", operator.as_str());
                    }
                    ResolverError::Filter(FilterError::UnknownField { filter, field }) => {
                        envelope = envelope
                            .with_data("filter", filter.as_str())
                            .with_data("field", field.as_str());
                    }
                    ResolverError::Filter(FilterError::UnknownFilter(name)) => {
                        envelope = envelope.with_data("filter", name.as_str());
                    }
                    ResolverError::Filter(FilterError::ExpectedObject { field, .. }) => {
                        envelope = envelope.with_data("field", field.as_str());
                    }
                    ResolverError::Filter(FilterError::InvalidValue { field, operator, .. }) => {
                        envelope = envelope
                            .with_data("field", field.as_str())
                            .with_data("operator", operator.as_str());
                    }
                    ResolverError::Filter(FilterError::DepthExceeded { max_depth }) => {
                        envelope = envelope.with_data("max_depth", *max_depth);
                    }
                    ResolverError::Graph(GraphError::Server { status, .. }) => {
                        envelope = envelope.with_data("status", *status);
                    }
                    _ => {}
                }
            }
        }

        envelope
    }
}

fn graph_error_type(error: &GraphError) -> &'static str {
    match error {
        GraphError::Transport(_) => "GraphTransportError",
        GraphError::Server { .. } => "GraphServerError",
        GraphError::Decode(_) => "GraphDecodeError",
        GraphError::Evaluation(_) => "TraversalError",
    }
}

fn with_key(envelope: ErrorEnvelope, key: &ResolverKey) -> ErrorEnvelope {
    envelope
        .with_data("type_name", key.type_name.as_str())
        .with_data("field_name", key.field_name.as_str())
}
