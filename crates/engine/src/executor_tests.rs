//! Tests for node execution and the webhook lifecycle driver.
//!
//! Remote calls go through `MockHelper`, static data through the in-memory
//! store, so no network or database is needed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use nodes::description::NodeTypeDescription;
use nodes::mock::MockHelper;
use nodes::trackingtime::{DeletePolicy, NODE_TYPE, TRIGGER_TYPE};
use nodes::{
    ExecutableNode, ExecutionContext, InMemoryStaticDataStore, Item, NodeError, NodeKey, StaticData,
    StaticDataStore, StoreError, WebhookRequest,
};

use crate::activation::Activation;
use crate::{EngineError, NodeDefinition, NodeRegistry, WebhookActivator, Workflow, WorkflowExecutor};

const BASE: &str = "https://host";
const URL: &str = "https://public.example/webhook/wf";

fn registry() -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::trackingtime(BASE, true, DeletePolicy::Tolerant))
}

fn action_workflow(parameters: Value, continue_on_fail: bool) -> Workflow {
    Workflow::new(
        "time entries",
        vec![NodeDefinition::new("tt", NODE_TYPE, parameters).continue_on_fail(continue_on_fail)],
    )
}

fn trigger_workflow() -> Workflow {
    Workflow::new(
        "watch",
        vec![NodeDefinition::new(
            "watch",
            TRIGGER_TYPE,
            json!({"accountId": "12", "topic": "time-entries"}),
        )],
    )
}

/// Echoes every input item back, tagged with the node id.
struct EchoNode {
    description: NodeTypeDescription,
}

#[async_trait]
impl ExecutableNode for EchoNode {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }

    async fn execute(&self, ctx: &ExecutionContext, items: Vec<Item>) -> Result<Vec<Item>, NodeError> {
        Ok(items
            .into_iter()
            .map(|item| Item::new(json!({"node": ctx.node_id, "input": item.json})))
            .collect())
    }
}

// ============================================================
// Execution
// ============================================================

#[tokio::test]
async fn run_node_dispatches_through_the_registry() {
    let mut registry = NodeRegistry::new();
    let description = NodeRegistry::trackingtime(BASE, true, DeletePolicy::Tolerant)
        .action(NODE_TYPE)
        .unwrap()
        .description()
        .clone();
    registry.register_action("echo", Arc::new(EchoNode { description }));

    let executor = WorkflowExecutor::new(Arc::new(registry), Arc::new(MockHelper::new()));
    let workflow = Workflow::new("echo", vec![NodeDefinition::new("e1", "echo", Value::Null)]);

    let result = executor
        .run_node(&workflow, "e1", vec![Item::new(json!({"n": 1}))])
        .await
        .unwrap();
    assert_eq!(result.items, vec![Item::new(json!({"node": "e1", "input": {"n": 1}}))]);
}

#[tokio::test]
async fn trackingtime_add_produces_paired_items() {
    let helper = Arc::new(MockHelper::returning(json!({"data": {"id": 5, "notes": "hi"}})));
    let executor = WorkflowExecutor::new(registry(), helper.clone());
    let workflow = action_workflow(json!({"operation": "add", "accountId": "12", "fields": {"notes": "hi"}}), false);

    let result = executor.run_node(&workflow, "tt", vec![Item::new(json!({}))]).await.unwrap();
    assert_eq!(result.items, vec![Item::paired(json!({"id": 5, "notes": "hi"}), 0)]);
    assert_eq!(helper.call(0).url, "https://host/12/events/add");
}

#[tokio::test]
async fn node_failure_is_wrapped_with_node_id() {
    let helper = Arc::new(MockHelper::failing(400, r#"{"message":"Invalid duration"}"#));
    let executor = WorkflowExecutor::new(registry(), helper);
    let workflow = action_workflow(json!({"operation": "add", "accountId": "12"}), false);

    let err = executor.run_node(&workflow, "tt", vec![Item::new(json!({}))]).await.unwrap_err();
    assert!(matches!(err, EngineError::NodeFailed { ref node_id, .. } if node_id == "tt"));
    assert_eq!(
        err.node_error().map(ToString::to_string).as_deref(),
        Some("GET /12/events/add: Invalid duration")
    );
}

#[tokio::test]
async fn continue_on_fail_comes_from_the_node_definition() {
    let helper = Arc::new(MockHelper::failing(400, r#"{"message":"Invalid duration"}"#));
    let executor = WorkflowExecutor::new(registry(), helper);
    let workflow = action_workflow(json!({"operation": "add", "accountId": "12"}), true);

    let result = executor.run_node(&workflow, "tt", vec![Item::new(json!({}))]).await.unwrap();
    assert_eq!(
        result.items,
        vec![Item::paired(json!({"error": "GET /12/events/add: Invalid duration"}), 0)]
    );
}

#[tokio::test]
async fn unknown_nodes_are_rejected() {
    let executor = WorkflowExecutor::new(registry(), Arc::new(MockHelper::new()));
    let workflow = Workflow::new("bad", vec![NodeDefinition::new("x", "shopify", Value::Null)]);

    assert!(matches!(
        executor.run_node(&workflow, "missing", Vec::new()).await,
        Err(EngineError::UnknownNode(_))
    ));
    assert!(matches!(
        executor.run_node(&workflow, "x", Vec::new()).await,
        Err(EngineError::UnknownNodeType(_))
    ));
}

#[tokio::test]
async fn load_options_falls_back_to_trigger_types() {
    let helper = Arc::new(MockHelper::returning(json!({"data": [{"account_id": 1, "company": "Acme"}]})));
    let executor = WorkflowExecutor::new(registry(), helper);

    let options = executor
        .load_options(TRIGGER_TYPE, "getAccounts", json!({}))
        .await
        .unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].name, "Acme");
}

#[tokio::test]
async fn all_accounts_setting_reaches_both_node_types() {
    let accounts = json!({"data": [{"account_id": 1, "company": "Acme"}]});
    let helper = Arc::new(MockHelper::returning(accounts.clone()).then_json(accounts));
    let registry = Arc::new(NodeRegistry::trackingtime(BASE, false, DeletePolicy::Tolerant));
    let executor = WorkflowExecutor::new(registry, helper.clone());

    executor.load_options(NODE_TYPE, "getAccounts", json!({})).await.unwrap();
    executor.load_options(TRIGGER_TYPE, "getAccounts", json!({})).await.unwrap();

    assert_eq!(helper.call_count(), 2);
    assert!(helper.call(0).qs.is_none());
    assert!(helper.call(1).qs.is_none());
}

// ============================================================
// Webhook lifecycle
// ============================================================

fn activator(helper: Arc<MockHelper>, store: Arc<InMemoryStaticDataStore>) -> WebhookActivator {
    WebhookActivator::new(registry(), helper, store)
}

#[tokio::test]
async fn activate_creates_and_persists_registration() {
    let helper = Arc::new(MockHelper::returning(json!({"data": {"id": 42, "secret": "s"}})));
    let store = Arc::new(InMemoryStaticDataStore::new());
    let workflow = trigger_workflow();

    let activation = activator(helper.clone(), store.clone())
        .activate(&workflow, "watch", URL)
        .await
        .unwrap();

    assert_eq!(activation, Activation::Created);
    // No stored id: check_exists made no call, create made one.
    assert_eq!(helper.call_count(), 1);

    let saved = store.load(&NodeKey::new(workflow.id, "watch")).await.unwrap();
    assert_eq!(saved.get_str("webhookId").as_deref(), Some("42"));
    assert_eq!(saved.get_str("webhookSecret").as_deref(), Some("s"));
}

#[tokio::test]
async fn activate_keeps_existing_registration() {
    let helper = Arc::new(MockHelper::returning(json!({"data": [{"id": "42"}]})));
    let store = Arc::new(InMemoryStaticDataStore::new());
    let workflow = trigger_workflow();
    let key = NodeKey::new(workflow.id, "watch");

    let mut data = StaticData::new();
    data.set("webhookId", "42");
    store.save(&key, &data).await.unwrap();

    let activation = activator(helper.clone(), store)
        .activate(&workflow, "watch", URL)
        .await
        .unwrap();
    assert_eq!(activation, Activation::AlreadyRegistered);
    assert_eq!(helper.call_count(), 1);
}

#[tokio::test]
async fn activate_recreates_webhook_deleted_out_of_band() {
    let helper = Arc::new(MockHelper::failing(404, "").then_json(json!({"data": {"id": "43"}})));
    let store = Arc::new(InMemoryStaticDataStore::new());
    let workflow = trigger_workflow();
    let key = NodeKey::new(workflow.id, "watch");

    let mut data = StaticData::new();
    data.set("webhookId", "42");
    store.save(&key, &data).await.unwrap();

    let activation = activator(helper, store.clone())
        .activate(&workflow, "watch", URL)
        .await
        .unwrap();

    assert_eq!(activation, Activation::Created);
    let saved = store.load(&key).await.unwrap();
    assert_eq!(saved.get_str("webhookId").as_deref(), Some("43"));
}

#[tokio::test]
async fn static_data_is_saved_even_when_deactivation_fails() {
    let helper = Arc::new(MockHelper::failing(403, r#"{"message":"Forbidden"}"#));
    let store = Arc::new(InMemoryStaticDataStore::new());
    let workflow = trigger_workflow();
    let key = NodeKey::new(workflow.id, "watch");

    let mut data = StaticData::new();
    data.set("webhookId", "42");
    data.set("webhookSecret", "s");
    store.save(&key, &data).await.unwrap();

    let err = activator(helper, store.clone())
        .deactivate(&workflow, "watch", URL)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NodeFailed { .. }));

    let saved = store.load(&key).await.unwrap();
    assert!(!saved.contains_key("webhookId"));
    assert!(!saved.contains_key("webhookSecret"));
}

#[tokio::test]
async fn deactivate_without_registration_is_a_no_op() {
    let helper = Arc::new(MockHelper::new());
    let store = Arc::new(InMemoryStaticDataStore::new());

    let deleted = activator(helper.clone(), store)
        .deactivate(&trigger_workflow(), "watch", URL)
        .await
        .unwrap();
    assert!(deleted);
    assert_eq!(helper.call_count(), 0);
}

#[tokio::test]
async fn dispatch_runs_the_trigger_webhook() {
    let activator = activator(Arc::new(MockHelper::new()), Arc::new(InMemoryStaticDataStore::new()));
    let request = WebhookRequest {
        body: json!([{"event": "event.created"}, {"event": "event.updated"}]),
        ..Default::default()
    };

    let items = activator.dispatch(&trigger_workflow(), "watch", request).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].json["event"], "event.updated");
}

/// Loads nothing and rejects every save.
struct BrokenStore;

#[async_trait]
impl StaticDataStore for BrokenStore {
    async fn load(&self, _key: &NodeKey) -> Result<StaticData, StoreError> {
        Ok(StaticData::new())
    }

    async fn save(&self, _key: &NodeKey, _data: &StaticData) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".into()))
    }
}

#[tokio::test]
async fn callback_error_wins_over_save_error() {
    let helper = Arc::new(MockHelper::failing(403, r#"{"message":"Forbidden"}"#));
    let activator = WebhookActivator::new(registry(), helper, Arc::new(BrokenStore));

    let err = activator.activate(&trigger_workflow(), "watch", URL).await.unwrap_err();
    assert!(matches!(err, EngineError::NodeFailed { .. }));
}

#[tokio::test]
async fn save_error_surfaces_when_callback_succeeds() {
    let helper = Arc::new(MockHelper::returning(json!({"data": {"id": "42", "secret": "abc"}})));
    let activator = WebhookActivator::new(registry(), helper, Arc::new(BrokenStore));

    let err = activator.activate(&trigger_workflow(), "watch", URL).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}
