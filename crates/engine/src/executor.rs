//! Node execution.
//!
//! `WorkflowExecutor` runs one node of a workflow over a batch of items:
//! 1. Looks the node up in the workflow and its implementation in the
//!    registry.
//! 2. Builds the `ExecutionContext` (parameters, continue-on-fail flag,
//!    request helper).
//! 3. Dispatches through `ExecutableNode::execute` and wraps any failure in
//!    `EngineError::NodeFailed`.
//!
//! Named callbacks (load options, resource mapping) are dispatched the same
//! way, by node type.

use std::collections::HashMap;
use std::sync::Arc;

use nodes::description::{PropertyOption, ResourceMapperFields};
use nodes::trackingtime::{DeletePolicy, TrackingtimeNode, TrackingtimeTrigger, NODE_TYPE, TRIGGER_TYPE};
use nodes::{ExecutableNode, ExecutionContext, Item, LoadOptionsContext, NodeParameters, RequestHelper, TriggerNode};
use serde_json::Value;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{EngineError, Workflow};

// ---------------------------------------------------------------------------
// Node registry
// ---------------------------------------------------------------------------

/// Maps `node_type` strings to node implementations.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    actions: HashMap<String, Arc<dyn ExecutableNode>>,
    triggers: HashMap<String, Arc<dyn TriggerNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the TrackingTime node and trigger.
    pub fn trackingtime(base_url: &str, only_active_accounts: bool, delete_policy: DeletePolicy) -> Self {
        let mut node = TrackingtimeNode::new(base_url);
        let mut trigger = TrackingtimeTrigger::new(base_url).with_delete_policy(delete_policy);
        if !only_active_accounts {
            node = node.with_all_accounts();
            trigger = trigger.with_all_accounts();
        }

        let mut registry = Self::new();
        registry.register_action(NODE_TYPE, Arc::new(node));
        registry.register_trigger(TRIGGER_TYPE, Arc::new(trigger));
        registry
    }

    pub fn register_action(&mut self, node_type: impl Into<String>, node: Arc<dyn ExecutableNode>) {
        self.actions.insert(node_type.into(), node);
    }

    pub fn register_trigger(&mut self, node_type: impl Into<String>, node: Arc<dyn TriggerNode>) {
        self.triggers.insert(node_type.into(), node);
    }

    pub fn action(&self, node_type: &str) -> Result<Arc<dyn ExecutableNode>, EngineError> {
        self.actions
            .get(node_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_owned()))
    }

    pub fn trigger(&self, node_type: &str) -> Result<Arc<dyn TriggerNode>, EngineError> {
        self.triggers
            .get(node_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub items: Vec<Item>,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless dispatcher; construct one per process and share it.
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    helper: Arc<dyn RequestHelper>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<NodeRegistry>, helper: Arc<dyn RequestHelper>) -> Self {
        Self { registry, helper }
    }

    /// Run one node over `items` and return its output items.
    ///
    /// # Errors
    /// `UnknownNode` / `UnknownNodeType` when the node cannot be resolved,
    /// `NodeFailed` when the node aborts the batch.
    #[instrument(skip(self, workflow, items), fields(workflow_id = %workflow.id, items = items.len()))]
    pub async fn run_node(
        &self,
        workflow: &Workflow,
        node_id: &str,
        items: Vec<Item>,
    ) -> Result<ExecutionResult, EngineError> {
        let node_def = workflow
            .node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;
        let node = self.registry.action(&node_def.node_type)?;

        let execution_id = Uuid::new_v4();
        let ctx = ExecutionContext {
            workflow_id: workflow.id,
            execution_id,
            node_id: node_def.id.clone(),
            parameters: NodeParameters::from_value(node_def.parameters.clone()),
            continue_on_fail: node_def.continue_on_fail,
            helper: self.helper.clone(),
        };

        match node.execute(&ctx, items).await {
            Ok(items) => {
                info!("node '{}' succeeded with {} items", node_id, items.len());
                Ok(ExecutionResult { execution_id, items })
            }
            Err(err) => {
                error!("node '{}' failed: {}", node_id, err);
                Err(EngineError::node_failed(node_id, err))
            }
        }
    }

    /// Run a node type's `load_options` callback against form values.
    pub async fn load_options(
        &self,
        node_type: &str,
        method: &str,
        parameters: Value,
    ) -> Result<Vec<PropertyOption>, EngineError> {
        let ctx = self.load_options_context(parameters);
        let result = match self.registry.action(node_type) {
            Ok(node) => node.load_options(method, &ctx).await,
            Err(_) => self.registry.trigger(node_type)?.load_options(method, &ctx).await,
        };
        result.map_err(|e| EngineError::node_failed(node_type, e))
    }

    /// Run a node type's `resource_mapping` callback against form values.
    pub async fn resource_mapping(
        &self,
        node_type: &str,
        method: &str,
        parameters: Value,
    ) -> Result<ResourceMapperFields, EngineError> {
        let ctx = self.load_options_context(parameters);
        self.registry
            .action(node_type)?
            .resource_mapping(method, &ctx)
            .await
            .map_err(|e| EngineError::node_failed(node_type, e))
    }

    fn load_options_context(&self, parameters: Value) -> LoadOptionsContext {
        LoadOptionsContext {
            parameters: NodeParameters::from_value(parameters),
            helper: self.helper.clone(),
        }
    }
}
