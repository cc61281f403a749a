//! The node traits: the contract between a node and the host that runs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::description::{NodeTypeDescription, PropertyOption, ResourceMapperFields};
use crate::error::{NodeError, OperationError};
use crate::http::RequestHelper;
use crate::static_data::StaticData;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One unit of data flowing between workflow steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub json: Value,
    /// Index of the input item this one was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<usize>,
}

impl Item {
    pub fn new(json: Value) -> Self {
        Self { json, paired_item: None }
    }

    pub fn paired(json: Value, item_index: usize) -> Self {
        Self {
            json,
            paired_item: Some(item_index),
        }
    }
}

/// Split a response payload into item payloads: an array yields one entry
/// per element, `null` yields nothing, anything else yields itself.
pub fn json_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// The values a user entered in a node's form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParameters(Map<String, Value>);

impl NodeParameters {
    /// Non-object values yield empty parameters.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A collection parameter; absent or non-object values yield an empty map.
    pub fn get_object(&self, name: &str) -> Map<String, Value> {
        match self.0.get(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// String view of a parameter; numbers are stringified.
    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A string (or numeric) parameter that must be present and non-blank.
    pub fn required_str(&self, name: &str) -> Result<String, NodeError> {
        match self.get_string(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(OperationError::new(format!("The parameter '{name}' is required.")).into()),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Resolve `={{ $json.path }}` expressions against an item.
    ///
    /// Only whole-value references are supported; a path that does not exist
    /// in the item resolves to `null`.
    pub fn resolve(&self, item: &Item) -> Self {
        Self(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, &item.json)))
                .collect(),
        )
    }
}

fn resolve_value(value: &Value, json: &Value) -> Value {
    match value {
        Value::String(s) => match json_reference(s) {
            Some(path) => lookup_path(json, path).cloned().unwrap_or(Value::Null),
            None => value.clone(),
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, json)))
                .collect(),
        ),
        Value::Array(values) => Value::Array(values.iter().map(|v| resolve_value(v, json)).collect()),
        other => other.clone(),
    }
}

fn json_reference(expression: &str) -> Option<&str> {
    let inner = expression
        .strip_prefix("={{")?
        .strip_suffix("}}")?
        .trim();
    inner.strip_prefix("$json.")
}

fn lookup_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(json, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(values) => segment.parse::<usize>().ok().and_then(|i| values.get(i)),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Shared context passed to a node during execution.
#[derive(Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// ID of the node inside the workflow.
    pub node_id: String,
    pub parameters: NodeParameters,
    /// Record per-item failures as output instead of aborting the batch.
    pub continue_on_fail: bool,
    pub helper: Arc<dyn RequestHelper>,
}

/// Context for webhook lifecycle callbacks.
///
/// `static_data` is loaded by the host before the callback and persisted
/// after it, whatever the outcome.
pub struct HookContext {
    pub workflow_id: Uuid,
    pub node_id: String,
    pub parameters: NodeParameters,
    /// Externally visible URL of this node's webhook.
    pub webhook_url: String,
    pub static_data: StaticData,
    pub helper: Arc<dyn RequestHelper>,
}

/// Context for load-options and resource-mapper callbacks.
#[derive(Clone)]
pub struct LoadOptionsContext {
    /// Current (possibly incomplete) values of the node's form.
    pub parameters: NodeParameters,
    pub helper: Arc<dyn RequestHelper>,
}

/// An inbound webhook request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookRequest {
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

fn unknown_method(kind: &str, method: &str) -> NodeError {
    NodeError::operation(format!("The {kind} method '{method}' is not registered on this node."))
}

// ---------------------------------------------------------------------------
// Node traits
// ---------------------------------------------------------------------------

/// An action node.
///
/// Named callbacks (`load_options`, `resource_mapping`) are dispatched by the
/// method name the description registers for them.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    fn description(&self) -> &NodeTypeDescription;

    /// Process the input items and return this node's output items.
    async fn execute(&self, ctx: &ExecutionContext, items: Vec<Item>) -> Result<Vec<Item>, NodeError>;

    async fn load_options(
        &self,
        method: &str,
        _ctx: &LoadOptionsContext,
    ) -> Result<Vec<PropertyOption>, NodeError> {
        Err(unknown_method("load options", method))
    }

    async fn resource_mapping(
        &self,
        method: &str,
        _ctx: &LoadOptionsContext,
    ) -> Result<ResourceMapperFields, NodeError> {
        Err(unknown_method("resource mapping", method))
    }
}

/// A webhook-driven trigger node.
///
/// The host calls `check_exists` on activation and `create` when it returns
/// `false`; `delete` on deactivation.
#[async_trait]
pub trait TriggerNode: Send + Sync {
    fn description(&self) -> &NodeTypeDescription;

    async fn check_exists(&self, ctx: &mut HookContext) -> Result<bool, NodeError>;

    async fn create(&self, ctx: &mut HookContext) -> Result<bool, NodeError>;

    async fn delete(&self, ctx: &mut HookContext) -> Result<bool, NodeError>;

    /// Turn an inbound request into output items.
    async fn webhook(&self, request: WebhookRequest) -> Result<Vec<Item>, NodeError>;

    async fn load_options(
        &self,
        method: &str,
        _ctx: &LoadOptionsContext,
    ) -> Result<Vec<PropertyOption>, NodeError> {
        Err(unknown_method("load options", method))
    }
}
