//! The `timeEntry` resource: form properties and the add / search / update
//! operations.

use std::str::FromStr;

use serde_json::{json, Map, Value};
use tracing::{error, instrument};

use crate::description::{
    NodeProperty, PropertyOption, PropertyType, ResourceMapperOptions,
};
use crate::error::{NodeError, OperationError};
use crate::traits::NodeParameters;

use super::constants::{
    MAPPING_MODE_DEFINE_BELOW, THIRD_PARTY_ID_SLUG, THIRD_PARTY_SERVICE_NAME,
    THIRD_PARTY_SERVICE_SLUG, TIME_ENTRY_SEARCH_ENTITY,
};
use super::request::{ApiClient, ApiRequest};
use super::response::{handle_api_error, keys_to_snake_case};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEntryOperation {
    Add,
    Search,
    Update,
}

impl FromStr for TimeEntryOperation {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "search" => Ok(Self::Search),
            "update" => Ok(Self::Update),
            other => Err(NodeError::operation(format!(
                "The operation '{other}' is not supported for time entries."
            ))),
        }
    }
}

/// Flat fields copied 1:1 into query parameters (field name, parameter).
const FIELD_PARAMETERS: [(&str, &str); 6] = [
    ("duration", "duration"),
    ("project", "project_name"),
    ("start", "start"),
    ("end", "end"),
    ("user_id", "user_id"),
    ("notes", "notes"),
];

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Translate an add/update field collection into query parameters.
///
/// `json_` may carry extra named `parameters` and a `custom_fields` array;
/// `custom_field_id` appends the two third-party tagging fields. The combined
/// custom fields are sent as one JSON string, and only when non-empty.
///
/// # Errors
/// An item-scoped [`OperationError`] when `json_` is not valid JSON.
pub fn entry_query(fields: &Map<String, Value>, item_index: usize) -> Result<Map<String, Value>, NodeError> {
    let mut qs = Map::new();

    for (field, parameter) in FIELD_PARAMETERS {
        if let Some(value) = fields.get(field).filter(|v| is_set(v)) {
            qs.insert(parameter.to_owned(), value.clone());
        }
    }

    let mut custom_fields: Vec<Value> = Vec::new();

    if let Some(raw) = fields.get("json_").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        let extra: Value = serde_json::from_str(raw).map_err(|err| {
            error!(item_index, %err, "extra params are not valid JSON");
            OperationError::new("The Field Extra Params is not a valid JSON.")
                .with_description(raw)
                .at_item(item_index)
        })?;

        if let Some(parameters) = extra.get("parameters").and_then(Value::as_array) {
            for param in parameters {
                if let Some(name) = param.get("parameter").and_then(Value::as_str) {
                    qs.insert(
                        name.to_owned(),
                        param.get("value").cloned().unwrap_or(Value::Null),
                    );
                }
            }
        }

        if let Some(extra_fields) = extra.get("custom_fields").and_then(Value::as_array) {
            for cf in extra_fields {
                custom_fields.push(json!({
                    "id": cf.get("id").cloned().unwrap_or(Value::Null),
                    "value": cf.get("value").cloned().unwrap_or(Value::Null),
                }));
            }
        }
    }

    if let Some(third_party_id) = fields.get("custom_field_id").filter(|v| is_set(v)) {
        custom_fields.push(json!({ "slug": THIRD_PARTY_ID_SLUG, "value": third_party_id }));
        custom_fields.push(json!({ "slug": THIRD_PARTY_SERVICE_SLUG, "value": THIRD_PARTY_SERVICE_NAME }));
    }

    if !custom_fields.is_empty() {
        qs.insert(
            "custom_fields".into(),
            Value::String(Value::Array(custom_fields).to_string()),
        );
    }

    Ok(qs)
}

/// Search filters with null, missing and blank-string values removed and
/// keys in snake_case.
pub fn search_filters(values: &Map<String, Value>) -> Map<String, Value> {
    let kept: Map<String, Value> = values
        .iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    match keys_to_snake_case(Value::Object(kept)).into_iter().next() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

async fn send(client: &ApiClient<'_>, request: ApiRequest, item_index: usize) -> Result<Value, NodeError> {
    let label = request.label();
    let response = client
        .request(request)
        .await
        .map_err(|e| handle_api_error(e, &label).at_item(item_index))?;
    Ok(response.get("data").cloned().unwrap_or(Value::Null))
}

fn account_id(params: &NodeParameters, item_index: usize) -> Result<String, NodeError> {
    params.required_str("accountId").map_err(|e| e.at_item(item_index))
}

/// `GET /{account}/events/add`
#[instrument(skip(client, params))]
pub async fn add(client: &ApiClient<'_>, params: &NodeParameters, item_index: usize) -> Result<Value, NodeError> {
    let account = account_id(params, item_index)?;
    let qs = entry_query(&params.get_object("fields"), item_index)?;

    send(client, ApiRequest::get(format!("{account}/events/add")).query(qs), item_index).await
}

/// `GET /{account}/search/events`
///
/// Only an explicit "define below" mapping mode is accepted; the check
/// happens before any remote call.
#[instrument(skip(client, params))]
pub async fn search(client: &ApiClient<'_>, params: &NodeParameters, item_index: usize) -> Result<Value, NodeError> {
    let filters = params.get_object("filters");
    match filters.get("mappingMode").and_then(Value::as_str) {
        Some(MAPPING_MODE_DEFINE_BELOW) => {}
        Some(mode) => {
            return Err(OperationError::new(format!(
                "The mapping mode '{mode}' is not supported; define the search fields below."
            ))
            .at_item(item_index)
            .into());
        }
        None => {
            return Err(OperationError::new("No mapping mode was set; define the search fields below.")
                .at_item(item_index)
                .into());
        }
    }

    let account = account_id(params, item_index)?;
    let criteria = params
        .required_str("selectCriteria")
        .map_err(|e| e.at_item(item_index))?;

    let values = match filters.get("value") {
        Some(Value::Object(values)) => values.clone(),
        _ => Map::new(),
    };
    let mut qs = search_filters(&values);
    qs.insert("type".into(), json!(criteria));
    qs.insert("entity".into(), json!(TIME_ENTRY_SEARCH_ENTITY));

    send(client, ApiRequest::get(format!("{account}/search/events")).query(qs), item_index).await
}

/// `GET /{account}/events/{id}/update`
#[instrument(skip(client, params))]
pub async fn update(client: &ApiClient<'_>, params: &NodeParameters, item_index: usize) -> Result<Value, NodeError> {
    let account = account_id(params, item_index)?;
    let event_id = params
        .required_str("event_id")
        .map_err(|e| e.at_item(item_index))?;

    let mut qs = entry_query(&params.get_object("updateFields"), item_index)?;
    qs.insert("event_id".into(), json!(event_id));

    send(
        client,
        ApiRequest::get(format!("{account}/events/{event_id}/update")).query(qs),
        item_index,
    )
    .await
}

// ---------------------------------------------------------------------------
// Form properties
// ---------------------------------------------------------------------------

pub fn time_entry_operations() -> Vec<NodeProperty> {
    vec![NodeProperty::new("Operation", "operation", PropertyType::Options)
        .no_data_expression()
        .show_when("resource", ["timeEntry"])
        .values(vec![
            PropertyOption::new("Add Time Entry", "add")
                .description("Add a new time entry")
                .action("Add a time entry"),
            PropertyOption::new("Search Time Entry", "search")
                .description("Search for a time entry")
                .action("Search a time entry"),
            PropertyOption::new("Update Time Entry", "update")
                .description("Update an existing time entry")
                .action("Update a time entry"),
        ])
        .default("add")]
}

/// Fields shared by the add and update collections.
fn entry_fields(user_label: &str) -> Vec<NodeProperty> {
    vec![
        NodeProperty::new("Duration", "duration", PropertyType::String)
            .description("E.g., 1h 30m, 90m, or 1.5"),
        NodeProperty::new("End", "end", PropertyType::DateTime)
            .description("End date and time of the entry"),
        NodeProperty::new("Extra Params (JSON Format)", "json_", PropertyType::String)
            .rows(4)
            .placeholder("{\n    \"key\": \"value\"\n}")
            .description("Additional parameters in JSON format"),
        NodeProperty::new("Notes", "notes", PropertyType::String).rows(4),
        NodeProperty::new("Project", "project", PropertyType::String)
            .description("Name, ID, or external ID of the project"),
        NodeProperty::new("Start", "start", PropertyType::DateTime)
            .description("Start date and time of the entry"),
        NodeProperty::new("Third Party Time Entry ID", "custom_field_id", PropertyType::String),
        NodeProperty::new(user_label, "user_id", PropertyType::String)
            .description("ID of the user to assign the entry to"),
    ]
}

const SEARCH_CRITERIA: [(&str, &str); 7] = [
    ("Project or Task Name", "ByProjectOrTaskName"),
    ("Project TrackingTime ID", "ByProjectID"),
    ("Task TrackingTime ID", "ByTaskID"),
    ("Third Party Project ID", "ByProjectExternalID"),
    ("Third Party Task ID", "ByTaskExternalID"),
    ("Third Party Time Entry ID", "ByExternalID"),
    ("TrackingTime ID", "ByID"),
];

pub fn time_entry_fields() -> Vec<NodeProperty> {
    let criteria = SEARCH_CRITERIA
        .iter()
        .map(|(name, value)| PropertyOption::new(*name, *value))
        .collect();

    vec![
        // timeEntry:add
        NodeProperty::new("Fields", "fields", PropertyType::Collection)
            .placeholder("Add Field")
            .show_when("operation", ["add"])
            .show_when("resource", ["timeEntry"])
            .fields(entry_fields("User ID")),
        // timeEntry:search
        NodeProperty::new("Search Criteria", "selectCriteria", PropertyType::Options)
            .required()
            .show_when("operation", ["search"])
            .show_when("resource", ["timeEntry"])
            .values(criteria)
            .default("ByID"),
        NodeProperty::new("Filters", "filters", PropertyType::ResourceMapper)
            .required()
            .show_when("operation", ["search"])
            .show_when("resource", ["timeEntry"])
            .default(json!({ "mappingMode": MAPPING_MODE_DEFINE_BELOW, "value": null }))
            .resource_mapper(
                ResourceMapperOptions {
                    resource_mapper_method: "getTimeEntrySearchFields".into(),
                    mode: "add".into(),
                    field_words: [
                        ("singular".to_string(), "filter".to_string()),
                        ("plural".to_string(), "filters".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                    add_all_fields: true,
                    support_auto_map: false,
                },
                vec!["selectCriteria".into()],
            ),
        // timeEntry:update
        NodeProperty::new("Time Entry ID", "event_id", PropertyType::String)
            .required()
            .show_when("operation", ["update"])
            .show_when("resource", ["timeEntry"])
            .description("The TrackingTime ID of the time entry to update"),
        NodeProperty::new("Update Fields", "updateFields", PropertyType::Collection)
            .placeholder("Add Field to Update")
            .show_when("operation", ["update"])
            .show_when("resource", ["timeEntry"])
            .fields(entry_fields("User")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHelper;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn params(value: Value) -> NodeParameters {
        NodeParameters::from_value(value)
    }

    #[test]
    fn flat_fields_map_one_to_one() {
        let qs = entry_query(
            &fields(json!({
                "duration": "1h",
                "project": "Website",
                "start": "2024-01-01T09:00:00",
                "end": "",
                "user_id": "42",
                "notes": "standup",
            })),
            0,
        )
        .unwrap();

        assert_eq!(qs["duration"], "1h");
        assert_eq!(qs["project_name"], "Website");
        assert_eq!(qs["start"], "2024-01-01T09:00:00");
        assert!(!qs.contains_key("end"));
        assert!(!qs.contains_key("project"));
        assert_eq!(qs["user_id"], "42");
        assert_eq!(qs["notes"], "standup");
        assert!(!qs.contains_key("custom_fields"));
    }

    #[test]
    fn extra_json_custom_fields_and_third_party_id_are_combined() {
        let qs = entry_query(
            &fields(json!({
                "json_": r#"{"custom_fields":[{"id":5,"value":"x"}]}"#,
                "custom_field_id": "ext-1",
            })),
            0,
        )
        .unwrap();

        let encoded = qs["custom_fields"].as_str().unwrap();
        let decoded: Value = serde_json::from_str(encoded).unwrap();
        assert_eq!(
            decoded,
            json!([
                {"id": 5, "value": "x"},
                {"slug": "EVENT_THIRD_PARTY_ID", "value": "ext-1"},
                {"slug": "EVENT_THIRD_PARTY_SERVICE", "value": "N8N"},
            ])
        );
    }

    #[test]
    fn extra_json_parameters_become_query_parameters() {
        let qs = entry_query(
            &fields(json!({
                "json_": r#"{"parameters":[{"parameter":"task_id","value":9},{"value":"orphan"}]}"#,
            })),
            0,
        )
        .unwrap();
        assert_eq!(qs["task_id"], 9);
        assert_eq!(qs.len(), 1);
    }

    #[test]
    fn invalid_extra_json_is_item_scoped() {
        let err = entry_query(&fields(json!({"json_": "{nope"})), 4).unwrap_err();
        assert_eq!(err.to_string(), "The Field Extra Params is not a valid JSON.");
        assert_eq!(err.item_index(), Some(4));
    }

    #[test]
    fn search_filter_keys_are_snake_cased() {
        let filtered = search_filters(&fields(json!({"projectId": 3, "Start Date": "2024-01-01"})));
        assert_eq!(Value::Object(filtered), json!({"project_id": 3, "start_date": "2024-01-01"}));
    }

    #[test]
    fn search_filters_strip_blank_values() {
        let filtered = search_filters(&fields(json!({
            "a": "x", "b": "", "c": "   ", "d": null, "e": 0, "f": false,
        })));
        assert_eq!(Value::Object(filtered), json!({"a": "x", "e": 0, "f": false}));
    }

    #[tokio::test]
    async fn add_requires_account_before_calling() {
        let helper = MockHelper::new();
        let client = ApiClient::new(&helper, "https://host");

        let err = add(&client, &params(json!({"fields": {}})), 1).await.unwrap_err();
        assert_eq!(err.item_index(), Some(1));
        assert_eq!(helper.call_count(), 0);
    }

    #[tokio::test]
    async fn add_posts_to_account_and_returns_data() {
        let helper = MockHelper::returning(json!({"data": {"id": 77}}));
        let client = ApiClient::new(&helper, "https://host");

        let data = add(
            &client,
            &params(json!({"accountId": "12", "fields": {"notes": "hi"}})),
            0,
        )
        .await
        .unwrap();

        assert_eq!(data, json!({"id": 77}));
        let request = helper.call(0);
        assert_eq!(request.url, "https://host/12/events/add");
        assert_eq!(request.query_param("notes"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn search_rejects_other_mapping_modes_without_calling() {
        let helper = MockHelper::new();
        let client = ApiClient::new(&helper, "https://host");

        let err = search(
            &client,
            &params(json!({
                "accountId": "12",
                "selectCriteria": "ByID",
                "filters": {"mappingMode": "autoMapInputData", "value": {}},
            })),
            2,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("autoMapInputData"));
        assert_eq!(err.item_index(), Some(2));
        assert_eq!(helper.call_count(), 0);
    }

    #[tokio::test]
    async fn search_without_mapping_mode_is_rejected_without_calling() {
        let helper = MockHelper::new();
        let client = ApiClient::new(&helper, "https://host");

        let err = search(&client, &params(json!({"accountId": "12", "selectCriteria": "ByID"})), 0)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No mapping mode"));
        assert_eq!(err.item_index(), Some(0));
        assert_eq!(helper.call_count(), 0);
    }

    #[tokio::test]
    async fn search_injects_type_and_entity() {
        let helper = MockHelper::returning(json!({"data": [{"id": 1}, {"id": 2}]}));
        let client = ApiClient::new(&helper, "https://host");

        let data = search(
            &client,
            &params(json!({
                "accountId": "12",
                "selectCriteria": "ByExternalID",
                "filters": {"mappingMode": "defineBelow", "value": {"external_id": "ext-1", "blank": " "}},
            })),
            0,
        )
        .await
        .unwrap();

        assert_eq!(data, json!([{"id": 1}, {"id": 2}]));
        let request = helper.call(0);
        assert_eq!(request.url, "https://host/12/search/events");
        let qs = request.qs.unwrap();
        assert_eq!(
            Value::Object(qs),
            json!({"external_id": "ext-1", "type": "ByExternalID", "entity": "Event"})
        );
    }

    #[tokio::test]
    async fn update_sends_id_in_path_and_query() {
        let helper = MockHelper::returning(json!({"data": {"id": 5}}));
        let client = ApiClient::new(&helper, "https://host");

        update(
            &client,
            &params(json!({
                "accountId": "12",
                "event_id": "5",
                "updateFields": {"duration": "2h"},
            })),
            0,
        )
        .await
        .unwrap();

        let request = helper.call(0);
        assert_eq!(request.url, "https://host/12/events/5/update");
        assert_eq!(request.query_param("event_id"), Some(&json!("5")));
        assert_eq!(request.query_param("duration"), Some(&json!("2h")));
    }

    #[tokio::test]
    async fn remote_failure_is_labelled_and_item_scoped() {
        let helper = MockHelper::failing(400, r#"{"message":"Project not found"}"#);
        let client = ApiClient::new(&helper, "https://host");

        let err = add(&client, &params(json!({"accountId": "12"})), 3).await.unwrap_err();
        assert_eq!(err.to_string(), "GET /12/events/add: Project not found");
        assert_eq!(err.item_index(), Some(3));
    }
}
