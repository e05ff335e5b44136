#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{NetilionError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, validate_url, Validate,
};
use std::fmt;

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Connection and credential settings of a Netilion technical user.
#[derive(Clone)]
pub struct ConfigurationParameters {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub client_application_id: Option<u64>,
    pub client_application_name: Option<String>,
    pub api_url: String,
    pub oauth_token_url: String,
    pub request_timeout_seconds: u64,
}

impl ConfigurationParameters {
    /// Derives `api_url` (`{endpoint}/v1/`) and `oauth_token_url`
    /// (`{endpoint}/oauth/token/`) from the endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            api_url: format!("{}/v1/", endpoint),
            oauth_token_url: format!("{}/oauth/token/", endpoint),
            endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            client_application_id: None,
            client_application_name: None,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    pub fn empty() -> Self {
        Self::new("", "", "", "", "")
    }

    pub fn with_client_application(mut self, id: Option<u64>, name: impl Into<String>) -> Self {
        self.client_application_id = id;
        self.client_application_name = Some(name.into());
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    /// Reads the `NETILION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| -> Result<String> {
            let value = std::env::var(name).ok();
            let value = validate_required_field(name, &value)?;
            Ok(value.clone())
        };

        let mut config = Self::new(
            required("NETILION_ENDPOINT")?,
            required("NETILION_CLIENT_ID")?,
            required("NETILION_CLIENT_SECRET")?,
            required("NETILION_USERNAME")?,
            required("NETILION_PASSWORD")?,
        );

        config.client_application_id = match std::env::var("NETILION_CLIENT_APPLICATION_ID") {
            Ok(raw) => Some(parse_u64("NETILION_CLIENT_APPLICATION_ID", &raw)?),
            Err(_) => None,
        };
        config.client_application_name = std::env::var("NETILION_CLIENT_APPLICATION_NAME").ok();
        if let Ok(raw) = std::env::var("NETILION_REQUEST_TIMEOUT") {
            config.request_timeout_seconds = parse_u64("NETILION_REQUEST_TIMEOUT", &raw)?;
        }

        Ok(config)
    }
}

pub(crate) fn parse_u64(field: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| NetilionError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: format!("not an unsigned integer: {}", e),
        })
}

impl fmt::Debug for ConfigurationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationParameters")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .field("client_application_id", &self.client_application_id)
            .field("client_application_name", &self.client_application_name)
            .field("api_url", &self.api_url)
            .field("oauth_token_url", &self.oauth_token_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl Validate for ConfigurationParameters {
    fn validate(&self) -> Result<()> {
        validate_url("endpoint", &self.endpoint)?;
        validate_url("api_url", &self.api_url)?;
        validate_url("oauth_token_url", &self.oauth_token_url)?;

        validate_non_empty_string("client_id", &self.client_id)?;
        validate_non_empty_string("client_secret", &self.client_secret)?;
        validate_non_empty_string("username", &self.username)?;
        validate_non_empty_string("password", &self.password)?;

        let timeout = self.request_timeout_seconds;
        validate_range("request_timeout_seconds", timeout, 1, 600)?;

        for (field, url) in [
            ("api_url", &self.api_url),
            ("oauth_token_url", &self.oauth_token_url),
        ] {
            if !crate::utils::validation::is_below(&self.endpoint, url) {
                return Err(NetilionError::ConfigValidationError {
                    field: field.to_string(),
                    message: format!("{} is not below endpoint {}", url, self.endpoint),
                });
            }
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
