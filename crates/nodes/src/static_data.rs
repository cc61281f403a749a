//! Per-node static data: host-owned key/value state that survives between
//! lifecycle callbacks (e.g. the identifier of a registered webhook).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Key/value state scoped to one node of one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticData(Map<String, Value>);

impl StaticData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String view of a value; numbers are stringified, `null` is absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for StaticData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Identifies the node a piece of static data belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub workflow_id: Uuid,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(workflow_id: Uuid, node_id: impl Into<String>) -> Self {
        Self {
            workflow_id,
            node_id: node_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("static data backend error: {0}")]
    Backend(String),

    #[error("stored static data is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistence for [`StaticData`].
///
/// Loading a key that was never saved yields empty data, not an error.
#[async_trait]
pub trait StaticDataStore: Send + Sync {
    async fn load(&self, key: &NodeKey) -> Result<StaticData, StoreError>;

    async fn save(&self, key: &NodeKey, data: &StaticData) -> Result<(), StoreError>;
}

/// In-memory store. Suitable for one-shot runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStaticDataStore {
    data: Mutex<HashMap<NodeKey, StaticData>>,
}

impl InMemoryStaticDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StaticDataStore for InMemoryStaticDataStore {
    async fn load(&self, key: &NodeKey) -> Result<StaticData, StoreError> {
        let data = self
            .data
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(data.get(key).cloned().unwrap_or_default())
    }

    async fn save(&self, key: &NodeKey, value: &StaticData) -> Result<(), StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if value.is_empty() {
            data.remove(key);
        } else {
            data.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
