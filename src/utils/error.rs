use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetilionError {
    #[error("Netilion API error: {message}")]
    Api { message: String },

    #[error("Malformed Netilion API response: {message}")]
    MalformedResponse { message: String },

    #[error("Malformed Netilion API request: {message}")]
    MalformedRequest { message: String },

    #[error("Invalid Netilion API state: {message}")]
    InvalidState { message: String },

    #[error("Resource not found or no permission")]
    BadPermission,

    #[error("Netilion quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Bad request to {url} - not a Netilion URL")]
    ForeignUrl { url: String },

    #[error("Unable to obtain access token ({status}): {message}")]
    TokenError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, NetilionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Network,
    Request,
    Response,
    Permission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Describes a failed HTTP response: the JSON `errors` array when the body
/// carries one, the bare status otherwise.
pub fn describe_response(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("errors").cloned())
        .map(|errors| errors.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

impl NetilionError {
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::Io(_) => ErrorCategory::Configuration,
            Self::TokenError { .. } => ErrorCategory::Authentication,
            Self::Http(_) => ErrorCategory::Network,
            Self::MalformedRequest { .. } | Self::ForeignUrl { .. } => ErrorCategory::Request,
            Self::BadPermission | Self::QuotaExceeded { .. } => ErrorCategory::Permission,
            Self::Api { .. }
            | Self::MalformedResponse { .. }
            | Self::InvalidState { .. }
            | Self::Serialization(_) => ErrorCategory::Response,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Permission if matches!(self, Self::QuotaExceeded { .. }) => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Configuration | ErrorCategory::Authentication => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::TokenError { .. } => {
                "Check client id, client secret, username and password of the technical user"
            }
            Self::BadPermission => {
                "Make sure the technical user has been granted access to the requested object"
            }
            Self::QuotaExceeded { .. } => "Wait for the quota to reset or upgrade the subscription",
            Self::Http(_) => "Check network connectivity to the Netilion endpoint and retry",
            Self::ForeignUrl { .. } => "Only URLs below the configured endpoint can be requested",
            Self::MissingConfigError { .. } => {
                "Provide the missing value in the config file or the NETILION_* environment"
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::Io(_) => "Review the configuration file",
            Self::MalformedRequest { .. } => "Review the arguments sent to the API",
            _ => "Inspect the API response in the debug log",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Authentication => format!("Authentication failed: {}", self),
            ErrorCategory::Network => format!("Could not reach Netilion: {}", self),
            ErrorCategory::Permission => format!("Access denied: {}", self),
            ErrorCategory::Request | ErrorCategory::Response => self.to_string(),
        }
    }
}
