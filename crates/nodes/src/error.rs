//! Node-level error types.

use serde_json::Value;
use thiserror::Error;

/// Failure reported by the host's HTTP layer.
///
/// Transport and authentication failures are carried unchanged up to the
/// node; the node decides whether a given status is expected (e.g. a 404 on
/// webhook deletion) or must be surfaced to the user.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, `None` when the request never produced a response.
    pub http_code: Option<u16>,
    /// Generic message for the failure.
    pub message: String,
    /// Messages supplied by the remote service, most specific first.
    pub messages: Vec<String>,
    /// Structured description (usually the parsed response body).
    pub description: Option<Value>,
    /// Extra context payload for debugging.
    pub context: Option<Value>,
}

impl ApiError {
    /// A failure that happened before any response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            http_code: None,
            message: message.into(),
            messages: Vec::new(),
            description: None,
            context: None,
        }
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// Remote messages are collected from `messages[]`, `message`,
    /// `response.message` and `error`, in that order.
    pub fn from_status(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let parsed: Option<Value> = serde_json::from_str(trimmed).ok();

        let mut messages: Vec<String> = Vec::new();
        if let Some(Value::Object(obj)) = &parsed {
            if let Some(Value::Array(list)) = obj.get("messages") {
                messages.extend(list.iter().filter_map(|m| m.as_str()).map(str::to_owned));
            }
            let candidates = [
                obj.get("message"),
                obj.get("response").and_then(|r| r.get("message")),
                obj.get("error"),
            ];
            for candidate in candidates.into_iter().flatten() {
                if let Some(text) = candidate.as_str() {
                    if !text.is_empty() && !messages.iter().any(|m| m == text) {
                        messages.push(text.to_owned());
                    }
                }
            }
        }

        let description = match parsed {
            Some(value) => Some(value),
            None if !trimmed.is_empty() => Some(Value::String(trimmed.to_owned())),
            None => None,
        };

        Self {
            http_code: Some(status),
            message: format!("Request failed with status code {status}"),
            messages,
            description,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.http_code == Some(404)
    }

    /// `true` for any 5xx response.
    pub fn is_server_error(&self) -> bool {
        matches!(self.http_code, Some(500..=599))
    }
}

/// A failure raised by the node itself: bad user input, a malformed
/// response, or a remote state the node cannot work with.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
    /// Secondary text, typically the raw payload that caused the failure.
    pub description: Option<String>,
    /// Index of the input item that failed, when the error is item-scoped.
    pub item_index: Option<usize>,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
            item_index: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn at_item(mut self, item_index: usize) -> Self {
        self.item_index = Some(item_index);
        self
    }
}

/// Errors returned by node entry points (execute, load options, webhook
/// lifecycle callbacks).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// Raised by the HTTP layer and not (yet) enriched by the node.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Raised or enriched by the node.
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl NodeError {
    /// Shorthand for a plain operation error.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(OperationError::new(message))
    }

    /// Scope the error to an input item. API errors are left untouched.
    pub fn at_item(self, item_index: usize) -> Self {
        match self {
            Self::Operation(err) if err.item_index.is_none() => {
                Self::Operation(err.at_item(item_index))
            }
            other => other,
        }
    }

    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::Operation(err) => err.item_index,
            Self::Api(_) => None,
        }
    }

    /// Secondary description, if any.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Operation(err) => err.description.clone(),
            Self::Api(err) => err.description.as_ref().map(|d| match d {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}
