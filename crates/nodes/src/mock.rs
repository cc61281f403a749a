//! `MockHelper`: a test double for `RequestHelper`.
//!
//! Useful in unit and integration tests where the remote API is either
//! unavailable or irrelevant: responses are scripted up front and every
//! request is recorded for later assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpRequestOptions, RawResponse, RequestHelper};

/// Scripted outcome of one request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Already-structured JSON body.
    Json(Value),
    /// Raw text body.
    Text(String),
    /// Fail with the given API error.
    Fail(ApiError),
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub credential_type: String,
    pub options: HttpRequestOptions,
}

/// A mock request helper that replays scripted responses in order and records
/// every call it receives. Running out of responses is a transport error.
#[derive(Debug, Default)]
pub struct MockHelper {
    responses: Mutex<VecDeque<MockResponse>>,
    /// All requests seen by this helper (in call order).
    pub calls: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose first request succeeds with `value`.
    pub fn returning(value: Value) -> Self {
        Self::new().then(MockResponse::Json(value))
    }

    /// Create a mock whose first request fails with `status` and `body`.
    pub fn failing(status: u16, body: &str) -> Self {
        Self::new().then(MockResponse::Fail(ApiError::from_status(status, body)))
    }

    /// Queue another scripted response.
    pub fn then(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn then_json(self, value: Value) -> Self {
        self.then(MockResponse::Json(value))
    }

    pub fn then_status(self, status: u16, body: &str) -> Self {
        self.then(MockResponse::Fail(ApiError::from_status(status, body)))
    }

    /// Number of requests this helper has received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The `n`-th recorded request.
    pub fn call(&self, n: usize) -> HttpRequestOptions {
        self.calls.lock().unwrap()[n].options.clone()
    }
}

#[async_trait]
impl RequestHelper for MockHelper {
    async fn request_with_authentication(
        &self,
        credential_type: &str,
        options: HttpRequestOptions,
    ) -> Result<RawResponse, ApiError> {
        self.calls.lock().unwrap().push(RecordedRequest {
            credential_type: credential_type.to_owned(),
            options,
        });

        match self.responses.lock().unwrap().pop_front() {
            Some(MockResponse::Json(v)) => Ok(RawResponse::Json(v)),
            Some(MockResponse::Text(t)) => Ok(RawResponse::Text(t)),
            Some(MockResponse::Fail(err)) => Err(err),
            None => Err(ApiError::transport("MockHelper has no scripted response left")),
        }
    }
}
