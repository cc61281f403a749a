//! Domain models for the host runtime.
//!
//! A workflow here is just the set of node instances the runtime drives;
//! item routing between nodes is the caller's business.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// One configured node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within its workflow; keys the node's static data.
    pub id: String,
    /// Maps to a node registered in the `NodeRegistry`.
    pub node_type: String,
    /// The node's form values.
    #[serde(default)]
    pub parameters: Value,
    /// Record per-item failures as output instead of failing the run.
    #[serde(default)]
    pub continue_on_fail: bool,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            parameters,
            continue_on_fail: false,
        }
    }

    pub fn continue_on_fail(mut self, enabled: bool) -> Self {
        self.continue_on_fail = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<NodeDefinition>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes,
        }
    }

    /// Look a node up by its id.
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
