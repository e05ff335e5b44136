use crate::config::{ConfigurationParameters, DEFAULT_REQUEST_TIMEOUT_SECONDS};
use crate::utils::error::{NetilionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File layout of a `netilion.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub netilion: NetilionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetilionSection {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub client_application_id: Option<u64>,
    pub client_application_name: Option<String>,
    pub api_url: Option<String>,
    pub oauth_token_url: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!("📄 Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| NetilionError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn into_parameters(self) -> ConfigurationParameters {
        let section = self.netilion;
        let mut config = ConfigurationParameters::new(
            section.endpoint,
            section.client_id,
            section.client_secret,
            section.username,
            section.password,
        );
        config.client_application_id = section.client_application_id;
        config.client_application_name = section.client_application_name;
        if let Some(api_url) = section.api_url {
            config.api_url = api_url;
        }
        if let Some(oauth_token_url) = section.oauth_token_url {
            config.oauth_token_url = oauth_token_url;
        }
        config.request_timeout_seconds = section
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);
        config
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables stay as written.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| NetilionError::config(e.to_string()))?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl ConfigurationParameters {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        TomlConfig::from_file(path).map(TomlConfig::into_parameters)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        TomlConfig::from_toml_str(content).map(TomlConfig::into_parameters)
    }
}
