//! Runtime configuration for the TrackingTime nodes, read from a TOML file.
//!
//! ```toml
//! base_url = "https://app.trackingtime.co/api/v4"
//! timeout_secs = 30
//! delete_policy = "tolerant"
//!
//! [credentials]
//! type = "app_password"
//! app_password = "..."
//! ```

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;

use super::constants::TRACKINGTIME_BASE_URL;
use super::credentials::Credentials;
use super::transport::ReqwestTransport;
use super::trigger::DeletePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "trackingtime.toml";
pub const EMAIL_ENV: &str = "TRACKINGTIME_EMAIL";
pub const PASSWORD_ENV: &str = "TRACKINGTIME_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("no TrackingTime credentials configured; set [credentials] or {EMAIL_ENV}/{PASSWORD_ENV}")]
    MissingCredentials,

    #[error(transparent)]
    Transport(#[from] ApiError),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrackingtimeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub credentials: Option<Credentials>,
    pub delete_policy: DeletePolicy,
    pub only_active_accounts: bool,
}

impl Default for TrackingtimeConfig {
    fn default() -> Self {
        Self {
            base_url: TRACKINGTIME_BASE_URL.to_owned(),
            timeout_secs: 30,
            user_agent: concat!("trackingtime-node/", env!("CARGO_PKG_VERSION")).to_owned(),
            credentials: None,
            delete_policy: DeletePolicy::default(),
            only_active_accounts: true,
        }
    }
}

impl TrackingtimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fill in query-string credentials from `TRACKINGTIME_EMAIL` and
    /// `TRACKINGTIME_PASSWORD` when both are set.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|name| std::env::var(name).ok())
    }

    fn with_credentials_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let (Some(email), Some(password)) = (lookup(EMAIL_ENV), lookup(PASSWORD_ENV)) {
            debug!("using query-string credentials from the environment");
            self.credentials = Some(Credentials::QueryString {
                email,
                password: SecretString::from(password),
            });
        }
        self
    }

    /// Build the HTTP transport, consuming the configured credentials.
    pub fn into_transport(self) -> Result<ReqwestTransport, ConfigError> {
        let timeout = self.timeout();
        let credentials = self.credentials.ok_or(ConfigError::MissingCredentials)?;
        Ok(ReqwestTransport::new(credentials, timeout, &self.user_agent)?)
    }
}

/// Load the configuration file. A missing file yields the defaults; an
/// unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> Result<TrackingtimeConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("No config file found at {}, using defaults", path.display());
            return Ok(TrackingtimeConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
