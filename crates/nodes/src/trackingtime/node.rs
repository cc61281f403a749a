//! The TrackingTime action node.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::description::{
    ConnectionType, CredentialRef, NodeDefaults, NodeProperty, NodeTypeDescription, PropertyOption,
    PropertyType, ResourceMapperFields,
};
use crate::error::NodeError;
use crate::traits::{json_array, ExecutableNode, ExecutionContext, Item, LoadOptionsContext};

use super::constants::{CREDENTIAL_TYPE, TRACKINGTIME_BASE_URL};
use super::load_options::get_accounts;
use super::request::ApiClient;
use super::resource_mapping::get_time_entry_search_fields;
use super::time_entry::{self, time_entry_fields, time_entry_operations, TimeEntryOperation};

pub const NODE_TYPE: &str = "trackingtime";

/// Time entries: add, search and update.
pub struct TrackingtimeNode {
    description: NodeTypeDescription,
    base_url: String,
    only_active_accounts: bool,
}

impl TrackingtimeNode {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            description: node_description(),
            base_url: base_url.into(),
            only_active_accounts: true,
        }
    }

    /// Offer every account in `getAccounts`, not only active ones.
    pub fn with_all_accounts(mut self) -> Self {
        self.only_active_accounts = false;
        self
    }

    async fn execute_item(&self, ctx: &ExecutionContext, item: &Item, item_index: usize) -> Result<Vec<Item>, NodeError> {
        let params = ctx.parameters.resolve(item);
        let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);

        let resource = params.get_str("resource").unwrap_or("timeEntry");
        if resource != "timeEntry" {
            return Err(NodeError::operation(format!("The resource '{resource}' is not known.")).at_item(item_index));
        }

        let operation = TimeEntryOperation::from_str(params.get_str("operation").unwrap_or("add"))
            .map_err(|e| e.at_item(item_index))?;

        let data = match operation {
            TimeEntryOperation::Add => time_entry::add(&client, &params, item_index).await?,
            TimeEntryOperation::Search => time_entry::search(&client, &params, item_index).await?,
            TimeEntryOperation::Update => time_entry::update(&client, &params, item_index).await?,
        };

        Ok(json_array(data)
            .into_iter()
            .map(|json| Item::paired(json, item_index))
            .collect())
    }
}

impl Default for TrackingtimeNode {
    fn default() -> Self {
        Self::new(TRACKINGTIME_BASE_URL)
    }
}

#[async_trait]
impl ExecutableNode for TrackingtimeNode {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }

    #[instrument(skip_all, fields(node_id = %ctx.node_id, items = items.len()))]
    async fn execute(&self, ctx: &ExecutionContext, items: Vec<Item>) -> Result<Vec<Item>, NodeError> {
        let mut output = Vec::with_capacity(items.len());

        for (item_index, item) in items.iter().enumerate() {
            match self.execute_item(ctx, item, item_index).await {
                Ok(produced) => output.extend(produced),
                Err(err) if ctx.continue_on_fail => {
                    warn!(item_index, error = %err, "item failed, continuing");
                    output.push(Item::paired(json!({ "error": err.to_string() }), item_index));
                }
                Err(err) => return Err(err.at_item(item_index)),
            }
        }

        info!(produced = output.len(), "TrackingTime node finished");
        Ok(output)
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

    async fn resource_mapping(&self, method: &str, ctx: &LoadOptionsContext) -> Result<ResourceMapperFields, NodeError> {
        match method {
            "getTimeEntrySearchFields" => {
                let client = ApiClient::new(ctx.helper.as_ref(), &self.base_url);
                let criteria = ctx.parameters.get_string("selectCriteria");
                Ok(get_time_entry_search_fields(&client, criteria.as_deref()).await)
            }
            other => Err(NodeError::operation(format!(
                "The resource mapping method '{other}' is not registered on this node."
            ))),
        }
    }
}

/// Account selector shared by both nodes.
pub(crate) fn account_property() -> NodeProperty {
    NodeProperty::new("Account Name or ID", "accountId", PropertyType::Options)
        .required()
        .load_options("getAccounts")
        .description("Choose from the list, or specify an ID using an expression")
}

fn node_description() -> NodeTypeDescription {
    let mut properties = vec![
        NodeProperty::new("Resource", "resource", PropertyType::Options)
            .no_data_expression()
            .values(vec![PropertyOption::new("Time Entry", "timeEntry")])
            .default("timeEntry"),
        account_property(),
    ];
    properties.extend(time_entry_operations());
    properties.extend(time_entry_fields());

    NodeTypeDescription {
        display_name: "TrackingTime".into(),
        name: NODE_TYPE.into(),
        icon: "file:trackingtime.svg".into(),
        group: vec!["output".into()],
        version: 1,
        subtitle: Some("={{$parameter[\"operation\"] + \": \" + $parameter[\"resource\"]}}".into()),
        description: "Simple, powerful time and attendance tracking API.".into(),
        defaults: NodeDefaults {
            name: "TrackingTime".into(),
        },
        usable_as_tool: true,
        inputs: vec![ConnectionType::Main],
        outputs: vec![ConnectionType::Main],
        credentials: vec![CredentialRef {
            name: CREDENTIAL_TYPE.into(),
            required: true,
        }],
        webhooks: Vec::new(),
        properties,
    }
}
