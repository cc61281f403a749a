//! Request adapter: builds one TrackingTime request descriptor and hands it
//! to the host's authenticated-request facility.
//!
//! No retries, rate limiting or caching happen here; transport and auth
//! failures come back to the caller unchanged.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::NodeError;
use crate::http::{HttpMethod, HttpRequestOptions, RequestHelper};

use super::constants::CREDENTIAL_TYPE;
use super::response::parse_response;

/// Option overrides merged over the defaults of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub headers: BTreeMap<String, String>,
    pub json: Option<bool>,
}

/// One call against the TrackingTime API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the base URL, with or without a leading slash.
    pub resource: String,
    pub body: Map<String, Value>,
    pub query: Map<String, Value>,
    /// Absolute URL replacing `base_url/resource`.
    pub uri: Option<String>,
    pub overrides: RequestOverrides,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            body: Map::new(),
            query: Map::new(),
            uri: None,
            overrides: RequestOverrides::default(),
        }
    }

    /// The TrackingTime API uses GET with query parameters even for
    /// mutating operations.
    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, resource)
    }

    pub fn query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.headers.insert(name.into(), value.into());
        self
    }

    /// `"GET /teams"`-style label used to prefix error messages.
    pub fn label(&self) -> String {
        format!("{} /{}", self.method, self.resource.trim_start_matches('/'))
    }

    /// Build the descriptor. Empty body and empty query are omitted
    /// entirely; the API rejects some empty-object encodings.
    pub fn into_options(self, base_url: &str) -> HttpRequestOptions {
        let url = self.uri.unwrap_or_else(|| {
            format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                self.resource.trim_start_matches('/')
            )
        });

        HttpRequestOptions {
            method: self.method,
            url,
            qs: (!self.query.is_empty()).then_some(self.query),
            body: (!self.body.is_empty()).then_some(Value::Object(self.body)),
            headers: self.overrides.headers,
            auth: None,
            json: self.overrides.json.unwrap_or(true),
        }
    }
}

/// A thin client binding a request helper to a base URL.
#[derive(Clone, Copy)]
pub struct ApiClient<'a> {
    helper: &'a dyn RequestHelper,
    base_url: &'a str,
}

impl<'a> ApiClient<'a> {
    pub fn new(helper: &'a dyn RequestHelper, base_url: &'a str) -> Self {
        Self { helper, base_url }
    }

    /// Issue the request and normalize the response body into JSON.
    pub async fn request(&self, request: ApiRequest) -> Result<Value, NodeError> {
        let options = request.into_options(self.base_url);
        debug!(method = %options.method, url = %options.url, "TrackingTime request");

        let raw = self
            .helper
            .request_with_authentication(CREDENTIAL_TYPE, options)
            .await?;
        parse_response(raw, None)
    }
}
