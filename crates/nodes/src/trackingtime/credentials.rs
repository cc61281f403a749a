//! TrackingTime credential variants and their injection into requests.
//!
//! Secrets are held in [`SecretString`] and only exposed while a request
//! descriptor is being authenticated.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::description::{CredentialTypeDescription, NodeProperty, PropertyType};
use crate::http::{BasicAuth, HttpMethod, HttpRequestOptions};

use super::constants::{APP_PASSWORD_USERNAME, CREDENTIAL_TYPE};

/// Authentication material for the TrackingTime API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Account email and password sent as query-string parameters.
    QueryString {
        email: String,
        #[serde(deserialize_with = "secret")]
        password: SecretString,
    },
    /// HTTP basic auth with the fixed `API_TOKEN` username.
    AppPassword {
        #[serde(deserialize_with = "secret")]
        app_password: SecretString,
    },
    /// HTTP basic auth with a user-supplied username.
    Basic {
        username: String,
        #[serde(deserialize_with = "secret")]
        password: SecretString,
    },
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl Credentials {
    /// Short label for logs; never includes secret material.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryString { .. } => "query_string",
            Self::AppPassword { .. } => "app_password",
            Self::Basic { .. } => "basic",
        }
    }

    /// Inject this credential into a request descriptor.
    pub fn authenticate(&self, options: &mut HttpRequestOptions) {
        match self {
            Self::QueryString { email, password } => {
                let qs = options.qs.get_or_insert_with(Map::new);
                qs.insert("email".into(), Value::String(email.clone()));
                qs.insert(
                    "password".into(),
                    Value::String(password.expose_secret().to_owned()),
                );
            }
            Self::AppPassword { app_password } => {
                options.auth = Some(BasicAuth {
                    username: APP_PASSWORD_USERNAME.to_owned(),
                    password: app_password.expose_secret().to_owned(),
                });
            }
            Self::Basic { username, password } => {
                options.auth = Some(BasicAuth {
                    username: username.clone(),
                    password: password.expose_secret().to_owned(),
                });
            }
        }
    }
}

/// The request the host issues to check that entered credentials work.
pub fn test_request(base_url: &str) -> HttpRequestOptions {
    HttpRequestOptions {
        method: HttpMethod::Get,
        url: format!("{}/login", base_url.trim_end_matches('/')),
        json: true,
        ..Default::default()
    }
}

/// Credential forms for the host UI.
pub fn credential_types(base_url: &str) -> Vec<CredentialTypeDescription> {
    let test_url = test_request(base_url).url;
    let password = || {
        NodeProperty::new("Password", "password", PropertyType::String).password()
    };

    vec![
        CredentialTypeDescription {
            name: CREDENTIAL_TYPE.into(),
            display_name: "Trackingtime API".into(),
            documentation_url: "https://developers.trackingtime.co/#intro".into(),
            properties: vec![
                NodeProperty::new("Email", "email", PropertyType::String),
                password(),
            ],
            test_url: test_url.clone(),
        },
        CredentialTypeDescription {
            name: "trackingtimeAppPasswordApi".into(),
            display_name: "Trackingtime App Password".into(),
            documentation_url: "https://developers.trackingtime.co/#intro".into(),
            properties: vec![NodeProperty::new("App Password", "appPassword", PropertyType::String)
                .password()],
            test_url: test_url.clone(),
        },
        CredentialTypeDescription {
            name: "trackingtimeTrackingtimeApi".into(),
            display_name: "Trackingtime Basic Auth".into(),
            documentation_url: "https://developers.trackingtime.co/#intro".into(),
            properties: vec![
                NodeProperty::new("Username", "username", PropertyType::String),
                password(),
            ],
            test_url,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_credentials_extend_existing_query() {
        let creds: Credentials = toml::from_str(
            r#"
            type = "query_string"
            email = "me@example.com"
            password = "hunter2"
            "#,
        )
        .unwrap();

        let mut qs = Map::new();
        qs.insert("filter".into(), Value::from("ACTIVE"));
        let mut options = HttpRequestOptions {
            qs: Some(qs),
            ..Default::default()
        };
        creds.authenticate(&mut options);

        assert_eq!(options.query_param("filter"), Some(&Value::from("ACTIVE")));
        assert_eq!(options.query_param("email"), Some(&Value::from("me@example.com")));
        assert_eq!(options.query_param("password"), Some(&Value::from("hunter2")));
        assert!(options.auth.is_none());
    }

    #[test]
    fn app_password_uses_fixed_username() {
        let creds = Credentials::AppPassword {
            app_password: SecretString::from("tok".to_string()),
        };
        let mut options = HttpRequestOptions::default();
        creds.authenticate(&mut options);

        let auth = options.auth.unwrap();
        assert_eq!(auth.username, "API_TOKEN");
        assert_eq!(auth.password, "tok");
        assert!(options.qs.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::Basic {
            username: "me".into(),
            password: SecretString::from("hunter2".to_string()),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_request_targets_login() {
        assert_eq!(
            test_request("https://app.trackingtime.co/api/v4/").url,
            "https://app.trackingtime.co/api/v4/login"
        );
    }

    #[test]
    fn credential_forms_share_the_login_test() {
        let types = credential_types("https://host/api/v4/");
        let names: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![CREDENTIAL_TYPE, "trackingtimeAppPasswordApi", "trackingtimeTrackingtimeApi"]
        );
        assert!(types.iter().all(|t| t.test_url == "https://host/api/v4/login"));

        let secret_fields: Vec<&str> = types
            .iter()
            .flat_map(|t| &t.properties)
            .filter(|p| p.type_options.as_ref().and_then(|o| o.password) == Some(true))
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(secret_fields, vec!["password", "appPassword", "password"]);
    }
}
