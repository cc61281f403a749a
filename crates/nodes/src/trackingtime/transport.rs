//! `reqwest`-backed implementation of the host's authenticated-request
//! facility.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, NodeError};
use crate::http::{HttpMethod, HttpRequestOptions, RawResponse, RequestHelper};

use super::credentials::{test_request, Credentials};
use super::response::{handle_api_error, parse_response};

/// Issues requests with a shared `reqwest::Client`, injecting one set of
/// TrackingTime credentials into each.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    pub fn new(credentials: Credentials, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, credentials })
    }

    /// Run the credential test request (`GET /login`).
    pub async fn test_credentials(&self, base_url: &str) -> Result<Value, NodeError> {
        let options = test_request(base_url);
        let raw = self
            .request_with_authentication(super::constants::CREDENTIAL_TYPE, options)
            .await
            .map_err(|e| handle_api_error(e.into(), "GET /login"))?;
        parse_response(raw, Some("GET /login"))
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Flatten a JSON query map into string pairs. `null` values are dropped,
/// nested values are sent as JSON text.
fn query_pairs(qs: &Map<String, Value>) -> Vec<(String, String)> {
    qs.iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), value))
        })
        .collect()
}

#[async_trait]
impl RequestHelper for ReqwestTransport {
    async fn request_with_authentication(
        &self,
        credential_type: &str,
        mut options: HttpRequestOptions,
    ) -> Result<RawResponse, ApiError> {
        self.credentials.authenticate(&mut options);
        debug!(
            credential_type,
            credential = self.credentials.kind(),
            method = %options.method,
            url = %options.url,
            "sending request"
        );

        let mut request = self.client.request(to_method(options.method), &options.url);
        if let Some(qs) = &options.qs {
            request = request.query(&query_pairs(qs));
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &options.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), url = %options.url, "request failed");
            return Err(ApiError::from_status(status.as_u16(), &text));
        }

        if options.json {
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                return Ok(RawResponse::Json(value));
            }
        }
        Ok(RawResponse::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(credentials: Credentials) -> ReqwestTransport {
        ReqwestTransport::new(credentials, Duration::from_secs(5), "trackingtime-node-test").unwrap()
    }

    fn query_credentials() -> Credentials {
        Credentials::QueryString {
            email: "me@example.com".into(),
            password: SecretString::from("pw".to_string()),
        }
    }

    #[test]
    fn query_pairs_drop_null_and_stringify_scalars() {
        let mut qs = Map::new();
        qs.insert("a".into(), json!("x"));
        qs.insert("b".into(), json!(3));
        qs.insert("c".into(), Value::Null);
        qs.insert("d".into(), json!(false));
        assert_eq!(
            query_pairs(&qs),
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "3".to_string()),
                ("d".to_string(), "false".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn query_credentials_are_sent_as_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/teams"))
            .and(query_param("email", "me@example.com"))
            .and(query_param("password", "pw"))
            .and(query_param("filter", "ACTIVE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut qs = Map::new();
        qs.insert("filter".into(), json!("ACTIVE"));
        let options = HttpRequestOptions {
            url: format!("{}/teams", server.uri()),
            qs: Some(qs),
            json: true,
            ..Default::default()
        };

        let raw = transport(query_credentials())
            .request_with_authentication("trackingtimeApi", options)
            .await
            .unwrap();
        assert_eq!(raw, RawResponse::Json(json!({"data": []})));
    }

    #[tokio::test]
    async fn app_password_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .and(basic_auth("API_TOKEN", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let creds = Credentials::AppPassword {
            app_password: SecretString::from("secret-token".to_string()),
        };
        let value = transport(creds).test_credentials(&server.uri()).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/webhooks"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Webhook not found"})),
            )
            .mount(&server)
            .await;

        let options = HttpRequestOptions {
            url: format!("{}/1/webhooks", server.uri()),
            json: true,
            ..Default::default()
        };
        let err = transport(query_credentials())
            .request_with_authentication("trackingtimeApi", options)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.messages, vec!["Webhook not found"]);
    }

    #[tokio::test]
    async fn non_json_success_body_is_returned_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/odd"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let options = HttpRequestOptions {
            url: format!("{}/odd", server.uri()),
            json: true,
            ..Default::default()
        };
        let raw = transport(query_credentials())
            .request_with_authentication("trackingtimeApi", options)
            .await
            .unwrap();
        assert_eq!(raw, RawResponse::Text("<html>".into()));
    }
}
