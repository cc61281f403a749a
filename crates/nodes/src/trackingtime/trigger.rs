//! The TrackingTime trigger node and its webhook lifecycle.
//!
//! The registered webhook is tracked in the node's static data:
//!
//! * `webhookId` / `webhookSecret`: set by `create`, cleared by `delete` and
//!   by `check_exists` when the remote side no longer knows the id.
//! * `deleteFailures`: the last few swallowed deletion failures.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::description::{
    ConnectionType, CredentialRef, NodeDefaults, NodeProperty, NodeTypeDescription, PropertyOption,
    PropertyType, ResponseMode, WebhookDescription,
};
use crate::error::{NodeError, OperationError};
use crate::http::HttpMethod;
use crate::static_data::StaticData;
use crate::traits::{json_array, HookContext, Item, LoadOptionsContext, TriggerNode, WebhookRequest};

use super::constants::{
    CREDENTIAL_TYPE, DELETE_FAILURES_KEY, MAX_DELETE_FAILURES, TIME_ENTRY_EVENTS,
    TOPIC_TIME_ENTRIES, TRACKINGTIME_BASE_URL, WEBHOOK_ID_KEY, WEBHOOK_SECRET_KEY,
};
use super::load_options::get_accounts;
use super::node::account_property;
use super::request::{ApiClient, ApiRequest};
use super::response::{handle_api_error, summarize_api_error};

pub const TRIGGER_TYPE: &str = "trackingtimeTrigger";

/// What `delete` does with a remote failure other than 404.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Every failure is returned to the caller.
    Strict,
    /// 5xx failures are logged to static data and reported as success.
    #[default]
    Tolerant,
}

pub struct TrackingtimeTrigger {
    description: NodeTypeDescription,
    base_url: String,
    delete_policy: DeletePolicy,
    only_active_accounts: bool,
}

impl TrackingtimeTrigger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            description: trigger_description(),
            base_url: base_url.into(),
            delete_policy: DeletePolicy::default(),
            only_active_accounts: true,
        }
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Offer every account in `getAccounts`, not only active ones.
    pub fn with_all_accounts(mut self) -> Self {
        self.only_active_accounts = false;
        self
    }
}

impl Default for TrackingtimeTrigger {
    fn default() -> Self {
        Self::new(TRACKINGTIME_BASE_URL)
    }
}

/// Event filter for a `topic` parameter value.
pub fn topic_events(topic: &str) -> Result<&'static str, NodeError> {
    match topic {
        TOPIC_TIME_ENTRIES => Ok(TIME_ENTRY_EVENTS),
        other => Err(NodeError::operation(format!("The topic '{other}' is not supported."))),
    }
}

fn clear_registration(static_data: &mut StaticData) {
    static_data.remove(WEBHOOK_ID_KEY);
    static_data.remove(WEBHOOK_SECRET_KEY);
}

/// Ids of the webhooks in a listing response (`webhooks.data[]` or `data[]`).
fn listed_webhook_ids(response: &Value) -> Vec<String> {
    let list = response
        .pointer("/webhooks/data")
        .or_else(|| response.get("data"))
        .and_then(Value::as_array);

    list.into_iter()
        .flatten()
        .filter_map(|webhook| match webhook.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Append to the deletion failure log, keeping only the newest entries.
fn record_delete_failure(static_data: &mut StaticData, webhook_id: &str, status: Option<u16>, message: &str) {
    let mut failures = match static_data.get(DELETE_FAILURES_KEY) {
        Some(Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    };
    failures.push(json!({
        "at": Utc::now().to_rfc3339(),
        "webhookId": webhook_id,
        "status": status,
        "message": message,
    }));
    if failures.len() > MAX_DELETE_FAILURES {
        let excess = failures.len() - MAX_DELETE_FAILURES;
        failures.drain(..excess);
    }
    static_data.set(DELETE_FAILURES_KEY, Value::Array(failures));
}

#[async_trait]
impl TriggerNode for TrackingtimeTrigger {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }

    #[instrument(skip_all, fields(node_id = %ctx.node_id))]
    async fn check_exists(&self, ctx: &mut HookContext) -> Result<bool, NodeError> {
        let Some(webhook_id) = ctx.static_data.get_str(WEBHOOK_ID_KEY) else {
            return Ok(false);
        };
        let account = ctx.parameters.required_str("accountId")?;

        let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);
        let request = ApiRequest::get(format!("{account}/webhooks"));
        let label = request.label();

        match client.request(request).await {
            Ok(response) => Ok(listed_webhook_ids(&response).contains(&webhook_id)),
            Err(NodeError::Api(err)) if err.is_not_found() => {
                info!(%webhook_id, "webhook list not found, forgetting registration");
                clear_registration(&mut ctx.static_data);
                Ok(false)
            }
            Err(err) => Err(handle_api_error(err, &label)),
        }
    }

    #[instrument(skip_all, fields(node_id = %ctx.node_id))]
    async fn create(&self, ctx: &mut HookContext) -> Result<bool, NodeError> {
        let account = ctx.parameters.required_str("accountId")?;
        let topic = ctx
            .parameters
            .get_string("topic")
            .unwrap_or_else(|| TOPIC_TIME_ENTRIES.to_owned());
        let events = topic_events(&topic)?;

        let mut query = Map::new();
        query.insert("url".into(), json!(ctx.webhook_url));
        query.insert("events".into(), json!(events));
        query.insert("grouped".into(), json!("false"));

        let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);
        let request = ApiRequest::get(format!("{account}/webhooks/add")).query(query);
        let label = request.label();
        let response = client
            .request(request)
            .await
            .map_err(|e| handle_api_error(e, &label))?;

        let webhook_id = match response.pointer("/data/id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(OperationError::new(format!(
                    "{label}: TrackingTime did not return a webhook identifier."
                ))
                .with_description(response.to_string())
                .into())
            }
        };

        ctx.static_data.set(WEBHOOK_ID_KEY, webhook_id.clone());
        match response.pointer("/data/secret") {
            Some(Value::String(secret)) => ctx.static_data.set(WEBHOOK_SECRET_KEY, secret.clone()),
            Some(Value::Number(secret)) => ctx.static_data.set(WEBHOOK_SECRET_KEY, secret.to_string()),
            _ => {}
        }

        info!(%webhook_id, events, "webhook registered");
        Ok(true)
    }

    #[instrument(skip_all, fields(node_id = %ctx.node_id))]
    async fn delete(&self, ctx: &mut HookContext) -> Result<bool, NodeError> {
        let Some(webhook_id) = ctx.static_data.get_str(WEBHOOK_ID_KEY) else {
            return Ok(true);
        };
        let account = ctx.parameters.required_str("accountId")?;

        let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);
        let request = ApiRequest::get(format!("{account}/webhooks/{webhook_id}/delete"));
        let label = request.label();
        let outcome = client.request(request).await;

        clear_registration(&mut ctx.static_data);

        match outcome {
            Ok(_) => {
                info!(%webhook_id, "webhook deleted");
                Ok(true)
            }
            Err(NodeError::Api(err)) if err.is_not_found() => {
                info!(%webhook_id, "webhook already gone");
                Ok(true)
            }
            Err(NodeError::Api(err))
                if self.delete_policy == DeletePolicy::Tolerant && err.is_server_error() =>
            {
                let summary = summarize_api_error(&err);
                warn!(%webhook_id, status = ?err.http_code, message = %summary.message, "webhook deletion failed");
                record_delete_failure(&mut ctx.static_data, &webhook_id, err.http_code, &summary.message);
                Ok(true)
            }
            Err(err) => Err(handle_api_error(err, &label)),
        }
    }

    async fn webhook(&self, request: WebhookRequest) -> Result<Vec<Item>, NodeError> {
        let payloads = match request.body {
            body @ (Value::Array(_) | Value::Object(_)) => json_array(body),
            other => vec![json!({ "body": other })],
        };
        Ok(payloads.into_iter().map(Item::new).collect())
    }

    async fn load_options(&self, method: &str, ctx: &LoadOptionsContext) -> Result<Vec<PropertyOption>, NodeError> {
        match method {
            "getAccounts" => {
                let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);
                get_accounts(&client, self.only_active_accounts).await
            }
            other => Err(NodeError::operation(format!(
                "The load options method '{other}' is not registered on this node."
            ))),
        }
    }
}

fn trigger_description() -> NodeTypeDescription {
    NodeTypeDescription {
        display_name: "TrackingTime Trigger".into(),
        name: TRIGGER_TYPE.into(),
        icon: "file:trackingtime.svg".into(),
        group: vec!["trigger".into()],
        version: 1,
        subtitle: Some("={{$parameter[\"topic\"]}}".into()),
        description: "Handle TrackingTime events via webhooks".into(),
        defaults: NodeDefaults {
            name: "TrackingTime Trigger".into(),
        },
        usable_as_tool: false,
        inputs: Vec::new(),
        outputs: vec![ConnectionType::Main],
        credentials: vec![CredentialRef {
            name: CREDENTIAL_TYPE.into(),
            required: true,
        }],
        webhooks: vec![WebhookDescription {
            name: "default".into(),
            http_method: HttpMethod::Post,
            path: "webhook".into(),
            response_mode: ResponseMode::OnReceived,
        }],
        properties: vec![
            account_property(),
            NodeProperty::new("Watch", "topic", PropertyType::Options)
                .values(vec![PropertyOption::new("Time Entries", TOPIC_TIME_ENTRIES)])
                .default(TOPIC_TIME_ENTRIES),
        ],
    }
}
