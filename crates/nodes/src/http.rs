//! Request descriptor handed to the host's authenticated-request facility.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// HTTP verbs a node may ask the host to issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// HTTP basic credentials injected by the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One outbound request, as built by a node.
///
/// `qs` and `body` are `None` when the node had nothing to send; the
/// transport must then omit them entirely rather than send `{}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequestOptions {
    pub method: HttpMethod,
    pub url: String,
    pub qs: Option<Map<String, Value>>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Filled in by credential injection, never by node code.
    pub auth: Option<BasicAuth>,
    /// Expect (and send) JSON.
    pub json: bool,
}

impl HttpRequestOptions {
    /// Look up a query-string parameter.
    pub fn query_param(&self, key: &str) -> Option<&Value> {
        self.qs.as_ref().and_then(|qs| qs.get(key))
    }
}

/// A successful response as the transport saw it.
///
/// Some transports hand back already-parsed JSON, others the raw text; the
/// node normalizes both at a single boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Json(Value),
    Text(String),
}

/// The host's authenticated-request facility.
///
/// The host looks up the credential named `credential_type`, injects it into
/// `options`, issues the request and reports non-success statuses as
/// [`ApiError`]s.
#[async_trait]
pub trait RequestHelper: Send + Sync {
    async fn request_with_authentication(
        &self,
        credential_type: &str,
        options: HttpRequestOptions,
    ) -> Result<RawResponse, ApiError>;
}
