//! Engine-level error types.

use nodes::{NodeError, StoreError};
use thiserror::Error;

/// Errors produced by the host runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No node implementation is registered under this type name.
    #[error("no node registered for node_type '{0}'")]
    UnknownNodeType(String),

    /// The named node does not exist in the workflow.
    #[error("workflow has no node '{0}'")]
    UnknownNode(String),

    /// A node callback failed; the run is aborted.
    #[error("node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: NodeError,
    },

    /// The trigger reported that it could not register its webhook.
    #[error("node '{0}' did not register a webhook")]
    WebhookNotCreated(String),

    /// Static data could not be loaded or saved.
    #[error("static data error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn node_failed(node_id: &str, source: NodeError) -> Self {
        Self::NodeFailed {
            node_id: node_id.to_owned(),
            source,
        }
    }

    /// The node error behind a `NodeFailed`.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            Self::NodeFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
