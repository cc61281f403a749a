//! Resource-mapper field loading for the time-entry search.

use serde_json::{json, Map, Value};
use tracing::{instrument, warn};

use crate::description::{FieldType, ResourceMapperField, ResourceMapperFields};

use super::constants::TIME_ENTRY_SEARCH_ENTITY;
use super::request::{ApiClient, ApiRequest};
use super::response::handle_api_error;

pub const NO_CRITERIA_NOTICE: &str = "Select a search criteria to load the available filters.";
pub const NO_FIELDS_NOTICE: &str = "TrackingTime did not return any filters for the selected criteria.";

/// Map a remote type name onto a coarse resource-mapper type.
pub fn map_field_type(raw: Option<&str>) -> FieldType {
    let Some(raw) = raw else {
        return FieldType::String;
    };
    let normalized = raw.to_lowercase();

    if normalized.contains("date") || normalized.contains("time") {
        FieldType::DateTime
    } else if normalized.contains("number") || normalized.contains("integer") {
        FieldType::Number
    } else if normalized.contains("bool") {
        FieldType::Boolean
    } else {
        FieldType::String
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn trimmed_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Convert the `inputFields` of a metadata response into mapper fields.
pub fn fields_from_response(response: &Value) -> Vec<ResourceMapperField> {
    let Some(input_fields) = response.get("inputFields").and_then(Value::as_array) else {
        return Vec::new();
    };

    input_fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let id = trimmed_str(field.get("key"))
                .map(str::to_owned)
                .unwrap_or_else(|| format!("field_{index}"));
            let display_name = trimmed_str(field.get("label"))
                .map(str::to_owned)
                .unwrap_or_else(|| id.clone());

            ResourceMapperField {
                id,
                display_name,
                required: truthy(field.get("required")),
                display: true,
                default_match: true,
                kind: map_field_type(field.get("type").and_then(Value::as_str)),
            }
        })
        .collect()
}

/// `getTimeEntrySearchFields`: searchable fields for the selected criteria.
///
/// Never fails: a remote error degrades to an empty field list so the form
/// stays usable.
#[instrument(skip(client))]
pub async fn get_time_entry_search_fields(
    client: &ApiClient<'_>,
    select_criteria: Option<&str>,
) -> ResourceMapperFields {
    let Some(criteria) = select_criteria.filter(|c| !c.trim().is_empty()) else {
        return ResourceMapperFields::empty_with_notice(NO_CRITERIA_NOTICE);
    };

    let mut query = Map::new();
    query.insert("entity".into(), json!(TIME_ENTRY_SEARCH_ENTITY));
    query.insert("type".into(), json!(criteria));
    let request = ApiRequest::get("zapier/createInput").query(query);
    let label = request.label();

    let response = match client.request(request).await {
        Ok(response) => response,
        Err(err) => {
            let err = handle_api_error(err, &label);
            warn!(error = %err, "could not load search fields");
            return ResourceMapperFields::default();
        }
    };

    let fields = fields_from_response(&response);
    if fields.is_empty() {
        return ResourceMapperFields::empty_with_notice(NO_FIELDS_NOTICE);
    }

    ResourceMapperFields {
        fields,
        empty_fields_notice: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHelper;

    #[test]
    fn type_heuristics() {
        assert_eq!(map_field_type(None), FieldType::String);
        assert_eq!(map_field_type(Some("DateTime")), FieldType::DateTime);
        assert_eq!(map_field_type(Some("timestamp")), FieldType::DateTime);
        assert_eq!(map_field_type(Some("Integer")), FieldType::Number);
        assert_eq!(map_field_type(Some("number")), FieldType::Number);
        assert_eq!(map_field_type(Some("boolean")), FieldType::Boolean);
        assert_eq!(map_field_type(Some("text")), FieldType::String);
    }

    #[tokio::test]
    async fn no_criteria_means_no_call() {
        let helper = MockHelper::new();
        let client = ApiClient::new(&helper, "https://host");

        let fields = get_time_entry_search_fields(&client, None).await;
        assert!(fields.fields.is_empty());
        assert_eq!(fields.empty_fields_notice.as_deref(), Some(NO_CRITERIA_NOTICE));
        assert_eq!(helper.call_count(), 0);
    }

    #[tokio::test]
    async fn fields_are_mapped_with_fallbacks() {
        let helper = MockHelper::returning(json!({"inputFields": [
            {"key": "project_id", "label": "Project", "type": "integer", "required": true},
            {"key": "  ", "type": "date"},
            {"label": "  "},
        ]}));
        let client = ApiClient::new(&helper, "https://host");

        let fields = get_time_entry_search_fields(&client, Some("ByProjectID")).await;
        assert_eq!(fields.empty_fields_notice, None);
        assert_eq!(fields.fields.len(), 3);
        assert_eq!(fields.fields[0].id, "project_id");
        assert_eq!(fields.fields[0].display_name, "Project");
        assert_eq!(fields.fields[0].kind, FieldType::Number);
        assert!(fields.fields[0].required);
        assert_eq!(fields.fields[1].id, "field_1");
        assert_eq!(fields.fields[1].kind, FieldType::DateTime);
        assert_eq!(fields.fields[2].display_name, "field_2");
        assert!(!fields.fields[2].required);

        let request = helper.call(0);
        assert_eq!(request.url, "https://host/zapier/createInput");
        assert_eq!(request.query_param("entity"), Some(&json!("Event")));
        assert_eq!(request.query_param("type"), Some(&json!("ByProjectID")));
    }

    #[tokio::test]
    async fn empty_remote_result_has_notice() {
        let helper = MockHelper::returning(json!({"inputFields": []}));
        let client = ApiClient::new(&helper, "https://host");

        let fields = get_time_entry_search_fields(&client, Some("ByID")).await;
        assert!(fields.fields.is_empty());
        assert_eq!(fields.empty_fields_notice.as_deref(), Some(NO_FIELDS_NOTICE));
    }

    #[tokio::test]
    async fn remote_error_degrades_to_empty() {
        let helper = MockHelper::failing(500, "oops");
        let client = ApiClient::new(&helper, "https://host");

        let fields = get_time_entry_search_fields(&client, Some("ByID")).await;
        assert_eq!(fields, ResourceMapperFields::default());
    }
}
