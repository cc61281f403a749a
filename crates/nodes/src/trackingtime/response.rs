//! Response normalization: string-or-object bodies, error summaries, and
//! snake_case key mapping.

use serde_json::{Map, Value};

use crate::error::{ApiError, NodeError, OperationError};
use crate::http::RawResponse;

/// Normalize a TrackingTime response into JSON.
///
/// Structured bodies pass through. Text bodies are trimmed; an empty body is
/// `{}`, anything else must parse as JSON.
///
/// # Errors
/// An [`OperationError`] describing the parse failure, with the raw text as
/// its description.
pub fn parse_response(raw: RawResponse, label: Option<&str>) -> Result<Value, NodeError> {
    match raw {
        RawResponse::Json(value) => Ok(value),
        RawResponse::Text(text) => parse_response_text(&text, label),
    }
}

pub fn parse_response_text(text: &str, label: Option<&str>) -> Result<Value, NodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(trimmed).map_err(|err| {
        let prefix = label.map(|l| format!("{l}: ")).unwrap_or_default();
        OperationError::new(format!(
            "{prefix}TrackingTime API returned invalid JSON ({err})."
        ))
        .with_description(trimmed)
        .into()
    })
}

/// Human-readable summary of an API failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSummary {
    pub message: String,
    pub description: Option<String>,
}

/// Primary message: first remote-supplied message, else the generic one.
/// Description: the structured description, else the context payload.
pub fn summarize_api_error(err: &ApiError) -> ErrorSummary {
    let message = err
        .messages
        .first()
        .cloned()
        .unwrap_or_else(|| err.message.clone());

    let description = err
        .description
        .as_ref()
        .or(err.context.as_ref())
        .map(stringify_description);

    ErrorSummary { message, description }
}

fn stringify_description(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Enrich an error with a label identifying the failing call.
///
/// Used by every caller (executors, load options, webhook lifecycle) so
/// error text is uniform: `"<label>: <primary message>"`.
pub fn handle_api_error(error: NodeError, label: &str) -> NodeError {
    match error {
        NodeError::Api(api) => {
            let summary = summarize_api_error(&api);
            OperationError {
                message: format!("{label}: {}", summary.message),
                description: summary.description,
                item_index: None,
            }
            .into()
        }
        NodeError::Operation(op) => OperationError {
            message: format!("{label}: {}", op.message),
            ..op
        }
        .into(),
    }
}

/// `projectName` → `project_name`, `Start Date` → `start_date`.
pub fn to_snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev: Option<char> = None;
    let mut in_separator = false;

    for ch in value.chars() {
        if ch.is_whitespace() || ch == '-' {
            if !in_separator {
                out.push('_');
                in_separator = true;
            }
            prev = Some(ch);
            continue;
        }
        in_separator = false;

        if ch.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
        prev = Some(ch);
    }

    out
}

/// Rename the keys of an object (or of every object in an array) to
/// snake_case. On collision the renamed key wins.
pub fn keys_to_snake_case(value: Value) -> Vec<Value> {
    let elements = match value {
        Value::Null => return Vec::new(),
        Value::Array(values) => values,
        other => vec![other],
    };

    elements
        .into_iter()
        .map(|element| match element {
            Value::Object(map) => {
                let mut renamed = Map::new();
                let (unchanged, changed): (Vec<_>, Vec<_>) = map
                    .into_iter()
                    .partition(|(k, _)| to_snake_case(k) == *k);
                for (k, v) in unchanged {
                    renamed.insert(k, v);
                }
                for (k, v) in changed {
                    renamed.insert(to_snake_case(&k), v);
                }
                Value::Object(renamed)
            }
            other => other,
        })
        .collect()
}
