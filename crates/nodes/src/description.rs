//! Declarative node description consumed by the host UI.
//!
//! Everything here is plain data: the host serialises it to JSON and renders
//! forms from it. Behaviour lives in the node traits.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::http::HttpMethod;

// ---------------------------------------------------------------------------
// Node type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionType {
    Main,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDefaults {
    pub name: String,
}

/// Reference to a credential type a node needs.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialRef {
    pub name: String,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseMode {
    /// Answer the caller as soon as the request is accepted.
    OnReceived,
}

/// An inbound webhook a trigger node listens on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDescription {
    pub name: String,
    pub http_method: HttpMethod,
    pub path: String,
    pub response_mode: ResponseMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDescription {
    pub display_name: String,
    pub name: String,
    pub icon: String,
    pub group: Vec<String>,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub description: String,
    pub defaults: NodeDefaults,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub usable_as_tool: bool,
    pub inputs: Vec<ConnectionType>,
    pub outputs: Vec<ConnectionType>,
    pub credentials: Vec<CredentialRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<WebhookDescription>,
    pub properties: Vec<NodeProperty>,
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    DateTime,
    Options,
    Collection,
    ResourceMapper,
}

/// One selectable value of an `options` property, or one entry returned
/// by a load-options method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyOption {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl PropertyOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            action: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// `options` is either a list of values or, for collections, nested fields.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PropertyOptions {
    Values(Vec<PropertyOption>),
    Fields(Vec<NodeProperty>),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapperOptions {
    pub resource_mapper_method: String,
    pub mode: String,
    pub field_words: BTreeMap<String, String>,
    pub add_all_fields: bool,
    pub support_auto_map: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_options_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_options_depends_on: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_mapper: Option<ResourceMapperOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<bool>,
}

/// `show` conditions: the property is displayed when every named parameter
/// currently holds one of the listed values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayOptions {
    pub show: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub display_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub default: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_data_expression: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_options: Option<TypeOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<PropertyOptions>,
}

impl NodeProperty {
    pub fn new(display_name: impl Into<String>, name: impl Into<String>, kind: PropertyType) -> Self {
        let default = match kind {
            PropertyType::Collection => Value::Object(Default::default()),
            PropertyType::Boolean => Value::Bool(false),
            PropertyType::Number => Value::from(0),
            _ => Value::String(String::new()),
        };
        Self {
            display_name: display_name.into(),
            name: name.into(),
            kind,
            default,
            required: false,
            no_data_expression: false,
            description: None,
            placeholder: None,
            display_options: None,
            type_options: None,
            options: None,
        }
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn no_data_expression(mut self) -> Self {
        self.no_data_expression = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Only show this property when `parameter` holds one of `values`.
    pub fn show_when<V: Into<Value>>(mut self, parameter: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.display_options
            .get_or_insert_with(DisplayOptions::default)
            .show
            .insert(parameter.to_owned(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn values(mut self, options: Vec<PropertyOption>) -> Self {
        self.options = Some(PropertyOptions::Values(options));
        self
    }

    pub fn fields(mut self, fields: Vec<NodeProperty>) -> Self {
        self.options = Some(PropertyOptions::Fields(fields));
        self
    }

    pub fn rows(mut self, rows: u32) -> Self {
        self.type_options.get_or_insert_with(TypeOptions::default).rows = Some(rows);
        self
    }

    pub fn password(mut self) -> Self {
        self.type_options.get_or_insert_with(TypeOptions::default).password = Some(true);
        self
    }

    pub fn load_options(mut self, method: impl Into<String>) -> Self {
        self.type_options
            .get_or_insert_with(TypeOptions::default)
            .load_options_method = Some(method.into());
        self
    }

    pub fn resource_mapper(mut self, options: ResourceMapperOptions, depends_on: Vec<String>) -> Self {
        let type_options = self.type_options.get_or_insert_with(TypeOptions::default);
        type_options.resource_mapper = Some(options);
        type_options.load_options_depends_on = Some(depends_on);
        self
    }
}

// ---------------------------------------------------------------------------
// Resource mapper
// ---------------------------------------------------------------------------

/// Coarse field types the resource mapper UI understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    String,
    DateTime,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapperField {
    pub id: String,
    pub display_name: String,
    pub required: bool,
    pub display: bool,
    pub default_match: bool,
    #[serde(rename = "type")]
    pub kind: FieldType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapperFields {
    pub fields: Vec<ResourceMapperField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_fields_notice: Option<String>,
}

impl ResourceMapperFields {
    /// No fields, with a notice explaining why.
    pub fn empty_with_notice(notice: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            empty_fields_notice: Some(notice.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Describes a credential type: the form the host renders and the request
/// it issues to test the entered values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialTypeDescription {
    pub name: String,
    pub display_name: String,
    pub documentation_url: String,
    pub properties: Vec<NodeProperty>,
    pub test_url: String,
}
